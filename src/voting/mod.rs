pub mod ballot;
pub mod tally;

pub use ballot::{validate_ballot, Ballot};
pub use tally::{build_winner_view, resolve_winner, tally};
