use serde::Serialize;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Ring membership seen by this node.
    pub ring: RingStatus,
}

/// Ring membership seen by the answering node.
#[derive(Debug, Serialize)]
pub struct RingStatus {
    /// Address of the answering node.
    pub me: String,
    /// Current members, the answering node included.
    pub members: Vec<String>,
    /// Rooms running on the answering node.
    pub rooms: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(ring: RingStatus) -> Self {
        Self {
            status: "ok".to_string(),
            ring,
        }
    }

    /// Create a health response indicating storage is unavailable.
    pub fn degraded(ring: RingStatus) -> Self {
        Self {
            status: "degraded".to_string(),
            ring,
        }
    }
}
