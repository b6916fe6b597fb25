//! Composite records returned by the experience repository.

use serde::{Deserialize, Serialize};

use eatadaki_types::{Experience, ExperienceRating, Rating, Spot};

/// An experience with its spot, as shown in listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceSummary {
    /// Spot the experience belongs to.
    pub spot: Spot,
    /// The experience itself.
    pub experience: Experience,
}

/// An experience with its spot and full rating history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceDetails {
    /// Spot the experience belongs to.
    pub spot: Spot,
    /// The experience itself.
    pub experience: Experience,
    /// Every rating given, oldest first.
    pub ratings: Vec<ExperienceRating>,
}

impl ExperienceDetails {
    /// The most recent rating, if any.
    pub fn latest_rating(&self) -> Option<Rating> {
        self.ratings.last().map(|r| r.rating)
    }

    /// Mean of all ratings in stars.
    pub fn average_stars(&self) -> Option<f32> {
        if self.ratings.is_empty() {
            return None;
        }
        let total: f32 = self.ratings.iter().map(|r| r.rating.stars()).sum();
        Some(total / self.ratings.len() as f32)
    }
}

impl From<ExperienceDetails> for ExperienceSummary {
    fn from(details: ExperienceDetails) -> Self {
        Self {
            spot: details.spot,
            experience: details.experience,
        }
    }
}
