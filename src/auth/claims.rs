use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkerClaims {
    pub sub: String, // worker id
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

impl WorkerClaims {
    pub fn worker_id(&self) -> Result<i32, String> {
        self.sub
            .parse::<i32>()
            .map_err(|_| format!("Token subject '{}' is not a worker id", self.sub))
    }
}
