pub mod results_announcer;
