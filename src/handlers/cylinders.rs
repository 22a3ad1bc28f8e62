use crate::core::error::{ApiError, ValidationError};
use crate::core::state::AppState;
use crate::handlers::blocking_write;
use crate::models::api::{AddCylinderRequest, CylinderResponse, SuccessResponse, UpdateWeightRequest};
use crate::ops::mutations::Mutation;
use crate::stores::profile_store::Commit;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Reject sizes outside the configured catalogue; an empty list allows any
fn check_allowed_size(allowed: &[f64], size: f64) -> Result<(), ValidationError> {
    if !size.is_finite() || size <= 0.0 {
        return Err(ValidationError::InvalidSize(size));
    }
    if allowed.is_empty() || allowed.iter().any(|s| (s - size).abs() < f64::EPSILON) {
        return Ok(());
    }

    let allowed = allowed
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(ValidationError::UnsupportedSize { size, allowed })
}

fn cylinder_response(status: StatusCode, commit: &Commit, cylinder_id: &str) -> Result<Response, ApiError> {
    let cylinder = commit
        .profile
        .cylinder(cylinder_id)
        .cloned()
        .ok_or_else(|| ApiError::InternalError(format!("Cylinder {} missing after commit", cylinder_id)))?;

    Ok((
        status,
        Json(CylinderResponse {
            success: true,
            version: commit.version,
            cylinder,
        }),
    )
        .into_response())
}

/// Add a full cylinder with a server-generated id
///
/// POST /users/{user_id}/cylinders
pub async fn add_cylinder_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(req): Json<AddCylinderRequest>,
) -> Result<Response, ApiError> {
    if let Err(e) = check_allowed_size(&state.config.cylinders.allowed_sizes, req.size) {
        warn!(user_id = %user_id, size = req.size, "Rejected cylinder size");
        return Err(e.into());
    }

    let id = Uuid::new_v4().to_string();
    let mutation = Mutation::AddCylinder {
        id: id.clone(),
        size: req.size,
    };
    let owner = user_id.clone();
    let commit = blocking_write(&state.store, move |store| store.apply(&owner, &mutation)).await?;

    info!(user_id = %user_id, cylinder_id = %id, size = req.size, "Cylinder added");

    cylinder_response(StatusCode::CREATED, &commit, &id)
}

/// Record a new weight reading
///
/// PUT /users/{user_id}/cylinders/{cylinder_id}
pub async fn update_weight_handler(
    State(state): State<Arc<AppState>>,
    Path((user_id, cylinder_id)): Path<(String, String)>,
    Json(req): Json<UpdateWeightRequest>,
) -> Result<Response, ApiError> {
    let mutation = Mutation::UpdateWeight {
        cylinder_id: cylinder_id.clone(),
        weight: req.weight,
    };
    let expected_version = req.expected_version;
    let owner = user_id.clone();
    let commit = blocking_write(&state.store, move |store| match expected_version {
        Some(expected) => store.apply_if_version(&owner, expected, &mutation),
        None => store.apply(&owner, &mutation),
    })
    .await?;

    info!(
        user_id = %user_id,
        cylinder_id = %cylinder_id,
        weight = req.weight,
        version = commit.version,
        "Cylinder weight updated"
    );

    cylinder_response(StatusCode::OK, &commit, &cylinder_id)
}

/// DELETE /users/{user_id}/cylinders/{cylinder_id}
///
/// Removing an id that is not present still succeeds.
pub async fn remove_cylinder_handler(
    State(state): State<Arc<AppState>>,
    Path((user_id, cylinder_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let mutation = Mutation::RemoveCylinder {
        cylinder_id: cylinder_id.clone(),
    };
    let owner = user_id.clone();
    blocking_write(&state.store, move |store| store.apply(&owner, &mutation)).await?;

    info!(user_id = %user_id, cylinder_id = %cylinder_id, "Cylinder removed");

    Ok((
        StatusCode::OK,
        Json(SuccessResponse {
            success: true,
            message: "Cylinder removed".to_string(),
        }),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{body_json, create_test_state, seed_profile};

    async fn add(state: &Arc<AppState>, size: f64) -> Result<Response, ApiError> {
        add_cylinder_handler(
            State(state.clone()),
            Path("u1".to_string()),
            Json(AddCylinderRequest { size }),
        )
        .await
    }

    fn weight(weight: f64, expected_version: Option<u64>) -> Json<UpdateWeightRequest> {
        Json(UpdateWeightRequest {
            weight,
            expected_version,
        })
    }

    #[test]
    fn test_check_allowed_size() {
        assert!(check_allowed_size(&[3.0, 6.0, 13.0], 6.0).is_ok());
        assert!(check_allowed_size(&[], 9.5).is_ok());
        assert_eq!(
            check_allowed_size(&[3.0, 6.0], 13.0),
            Err(ValidationError::UnsupportedSize {
                size: 13.0,
                allowed: "3, 6".to_string()
            })
        );
        assert_eq!(check_allowed_size(&[], -1.0), Err(ValidationError::InvalidSize(-1.0)));
    }

    #[tokio::test]
    async fn test_add_cylinder_starts_full() {
        let (_dir, state) = create_test_state();
        seed_profile(&state, "u1");

        let response = add(&state, 6.0).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let json = body_json(response).await;
        assert_eq!(json["cylinder"]["size"], 6.0);
        assert_eq!(json["cylinder"]["currentWeight"], 6.0);
        assert_eq!(json["version"], 2);

        let id = json["cylinder"]["id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_add_unsupported_size() {
        let (_dir, state) = create_test_state();
        seed_profile(&state, "u1");

        let err = add(&state, 9.0).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        assert!(state.store.get("u1").unwrap().gas_cylinders.is_empty());
    }

    #[tokio::test]
    async fn test_add_to_missing_profile() {
        let (_dir, state) = create_test_state();

        let err = add(&state, 6.0).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_weight_clamps() {
        let (_dir, state) = create_test_state();
        seed_profile(&state, "u1");
        let json = body_json(add(&state, 6.0).await.unwrap()).await;
        let id = json["cylinder"]["id"].as_str().unwrap().to_string();

        let response = update_weight_handler(
            State(state.clone()),
            Path(("u1".to_string(), id.clone())),
            weight(9.0, None),
        )
        .await
        .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["cylinder"]["currentWeight"], 6.0);

        update_weight_handler(State(state.clone()), Path(("u1".to_string(), id.clone())), weight(-2.0, None))
            .await
            .unwrap();
        assert_eq!(state.store.get("u1").unwrap().cylinder(&id).unwrap().current_weight, 0.0);
    }

    #[tokio::test]
    async fn test_update_unknown_cylinder() {
        let (_dir, state) = create_test_state();
        seed_profile(&state, "u1");

        let err = update_weight_handler(
            State(state),
            Path(("u1".to_string(), "nope".to_string())),
            weight(1.0, None),
        )
        .await
        .unwrap_err();

        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_with_stale_version_conflicts() {
        let (_dir, state) = create_test_state();
        seed_profile(&state, "u1");
        let json = body_json(add(&state, 13.0).await.unwrap()).await;
        let id = json["cylinder"]["id"].as_str().unwrap().to_string();

        update_weight_handler(State(state.clone()), Path(("u1".to_string(), id.clone())), weight(10.0, Some(2)))
            .await
            .unwrap();

        let err = update_weight_handler(State(state.clone()), Path(("u1".to_string(), id.clone())), weight(8.0, Some(2)))
            .await
            .unwrap_err();

        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
        assert_eq!(state.store.get("u1").unwrap().cylinder(&id).unwrap().current_weight, 10.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_adds_all_commit() {
        let (_dir, state) = create_test_state();
        seed_profile(&state, "u1");

        let requests = (0..20).map(|_| add(&state, 6.0));
        let results = futures::future::join_all(requests).await;

        assert!(results.iter().all(|r| r.is_ok()));
        let commit = state.store.get_with_version("u1").unwrap();
        assert_eq!(commit.profile.gas_cylinders.len(), 20);
        assert_eq!(commit.version, 21);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_dir, state) = create_test_state();
        seed_profile(&state, "u1");
        let json = body_json(add(&state, 3.0).await.unwrap()).await;
        let id = json["cylinder"]["id"].as_str().unwrap().to_string();

        for _ in 0..2 {
            let response = remove_cylinder_handler(State(state.clone()), Path(("u1".to_string(), id.clone())))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert!(state.store.get("u1").unwrap().gas_cylinders.is_empty());
    }
}
