//! Image probe with scripted per-URL outcomes

use async_trait::async_trait;
use packop_reveal::resolver::{ImageProbe, ProbeError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// One probe call as seen by the probe
#[derive(Debug, Clone)]
pub struct ProbeAttempt {
    pub url: String,
    pub at: Instant,
}

#[derive(Debug, Clone)]
struct Script {
    delay: Duration,
    outcome: Result<(), ProbeError>,
}

/// Probe answering from a script; unscripted URLs fail immediately
#[derive(Default)]
pub struct ScriptedProbe {
    scripts: Mutex<HashMap<String, Script>>,
    attempts: Mutex<Vec<ProbeAttempt>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// `url` loads after `delay`
    pub fn succeed(self, url: impl Into<String>, delay: Duration) -> Self {
        self.script(url, delay, Ok(()))
    }

    /// `url` fails after `delay`
    pub fn fail(self, url: impl Into<String>, delay: Duration) -> Self {
        self.script(url, delay, Err(ProbeError::Status(404)))
    }

    fn script(self, url: impl Into<String>, delay: Duration, outcome: Result<(), ProbeError>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.into(), Script { delay, outcome });
        self
    }

    pub fn attempts(&self) -> Vec<ProbeAttempt> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempted_urls(&self) -> Vec<String> {
        self.attempts().into_iter().map(|a| a.url).collect()
    }
}

#[async_trait]
impl ImageProbe for ScriptedProbe {
    async fn probe(&self, url: &str) -> Result<(), ProbeError> {
        self.attempts.lock().unwrap().push(ProbeAttempt {
            url: url.to_string(),
            at: Instant::now(),
        });

        let script = self.scripts.lock().unwrap().get(url).cloned();
        match script {
            Some(script) => {
                tokio::time::sleep(script.delay).await;
                script.outcome
            }
            None => Err(ProbeError::Network("unreachable".to_string())),
        }
    }
}
