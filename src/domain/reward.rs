//! Reward policy for completed meetups.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::session::MeetupSession;
use crate::error::MeetupError;

/// Points and copy granted for a completed meetup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Reward {
    /// Points credited to each participant.
    pub points: u32,
    /// Message shown to the participants.
    pub message: String,
}

/// Computes the reward for a session that is about to complete.
///
/// Called inside the completion transaction: an error aborts the whole
/// completion and nothing is written.
pub trait RewardPolicy: Send + Sync + std::fmt::Debug {
    /// Returns the reward for `session`.
    ///
    /// # Errors
    ///
    /// Returns [`MeetupError::RewardPolicy`] if no reward can be granted.
    fn compute_reward(&self, session: &MeetupSession) -> Result<Reward, MeetupError>;
}

/// Grants the same reward to every completed session.
#[derive(Debug, Clone)]
pub struct FixedRewardPolicy {
    points: u32,
    message: String,
}

impl FixedRewardPolicy {
    /// Creates a policy granting `points` with `message`.
    #[must_use]
    pub fn new(points: u32, message: impl Into<String>) -> Self {
        Self {
            points,
            message: message.into(),
        }
    }
}

impl Default for FixedRewardPolicy {
    fn default() -> Self {
        Self::new(100, "You met up! Enjoy your reward.")
    }
}

impl RewardPolicy for FixedRewardPolicy {
    fn compute_reward(&self, _session: &MeetupSession) -> Result<Reward, MeetupError> {
        if self.points == 0 {
            return Err(MeetupError::RewardPolicy(
                "reward points must be positive".to_string(),
            ));
        }
        Ok(Reward {
            points: self.points,
            message: self.message.clone(),
        })
    }
}
