//! Reward signal evaluation endpoint
//!
//! Pure calculation over validated numeric inputs; the external autonomy
//! controller owns the decision to act on `approved`.

use axum::{extract::State, Json};

use crate::scoring::{reward_signal, RewardDecision, RewardInputs};
use crate::{ApiError, AppState};

/// POST /api/scoring/reward
pub async fn evaluate_reward(
    State(_state): State<AppState>,
    Json(inputs): Json<RewardInputs>,
) -> Result<Json<RewardDecision>, ApiError> {
    for (name, value) in [
        ("visibility_delta", inputs.visibility_delta),
        ("revenue_delta", inputs.revenue_delta),
        ("api_cost", inputs.api_cost),
        ("min_reward", inputs.min_reward),
    ] {
        if !value.is_finite() {
            return Err(ApiError::BadRequest(format!("{} must be finite", name)));
        }
    }

    Ok(Json(reward_signal(&inputs)))
}
