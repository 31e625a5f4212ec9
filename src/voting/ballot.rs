use crate::error::{PelaError, Result};
use crate::models::{Match, RsvpStatus};
use chrono::{DateTime, Utc};

/// What needs to hold for a vote to be stored.
pub struct Ballot<'a> {
    pub game: &'a Match,
    pub voter_id: &'a str,
    pub voter_rsvp: Option<RsvpStatus>,
    pub voted_user_id: &'a str,
    pub voted_rsvp: Option<RsvpStatus>,
}

pub fn validate_ballot(ballot: &Ballot<'_>, now: DateTime<Utc>, window_hours: i64) -> Result<()> {
    if !ballot.game.is_voting_open(now, window_hours) {
        return Err(PelaError::VotingClosed);
    }
    if ballot.voter_rsvp != Some(RsvpStatus::Confirmed) {
        return Err(PelaError::NotParticipant(ballot.voter_id.to_string()));
    }
    if ballot.voted_rsvp != Some(RsvpStatus::Confirmed) {
        return Err(PelaError::NotParticipant(ballot.voted_user_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn game() -> Match {
        let kickoff = Utc.with_ymd_and_hms(2026, 10, 10, 22, 0, 0).unwrap();
        Match::new("g".into(), "Arena".into(), kickoff, None)
    }

    fn ballot(game: &Match, voter: Option<RsvpStatus>, voted: Option<RsvpStatus>) -> Ballot<'_> {
        Ballot {
            game,
            voter_id: "voter",
            voter_rsvp: voter,
            voted_user_id: "voted",
            voted_rsvp: voted,
        }
    }

    #[test]
    fn confirmed_players_can_vote_after_kickoff() {
        let g = game();
        let now = g.scheduled_at + Duration::hours(2);
        let b = ballot(&g, Some(RsvpStatus::Confirmed), Some(RsvpStatus::Confirmed));
        assert!(validate_ballot(&b, now, 24).is_ok());
    }

    #[test]
    fn voting_before_kickoff_is_rejected() {
        let g = game();
        let now = g.scheduled_at - Duration::hours(1);
        let b = ballot(&g, Some(RsvpStatus::Confirmed), Some(RsvpStatus::Confirmed));
        assert!(matches!(validate_ballot(&b, now, 24), Err(PelaError::VotingClosed)));
    }

    #[test]
    fn declined_voter_is_rejected() {
        let g = game();
        let now = g.scheduled_at + Duration::hours(1);
        let b = ballot(&g, Some(RsvpStatus::Declined), Some(RsvpStatus::Confirmed));
        match validate_ballot(&b, now, 24) {
            Err(PelaError::NotParticipant(id)) => assert_eq!(id, "voter"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn candidate_without_rsvp_is_rejected() {
        let g = game();
        let now = g.scheduled_at + Duration::hours(1);
        let b = ballot(&g, Some(RsvpStatus::Confirmed), None);
        match validate_ballot(&b, now, 24) {
            Err(PelaError::NotParticipant(id)) => assert_eq!(id, "voted"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
