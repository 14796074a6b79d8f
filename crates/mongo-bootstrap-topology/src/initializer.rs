//! One-shot replica set initiation followed by a bounded readiness poll.

use mongo_bootstrap_core::{ReplicaSetConfig, RetryPolicy};
use tracing::{debug, error, info, instrument, warn};

use crate::admin::{CommandReply, ReplicaSetAdmin};
use crate::error::ErrorClass;

/// How an initialization run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A status check reported the set ready.
    Ready {
        /// Status checks performed, including the successful one.
        attempts: u32,
    },
    /// Every status check in the budget came back not ready.
    TimedOut {
        /// Status checks performed.
        attempts: u32,
    },
    /// Initiation was rejected or polling hit a permanent error.
    Failed {
        /// Status checks performed before failing (0 when initiation failed).
        attempts: u32,
        /// Human-readable cause.
        reason: String,
    },
}

impl PollOutcome {
    /// Whether the set became ready.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Status checks performed.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Ready { attempts } | Self::TimedOut { attempts } | Self::Failed { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Drives `replSetInitiate` and the readiness poll.
#[derive(Debug)]
pub struct TopologyInitializer<A> {
    admin: A,
    config: ReplicaSetConfig,
    policy: RetryPolicy,
    require_primary: bool,
}

impl<A: ReplicaSetAdmin> TopologyInitializer<A> {
    /// Create an initializer with the default 30 x 5s budget.
    #[must_use]
    pub fn new(admin: A, config: ReplicaSetConfig) -> Self {
        Self {
            admin,
            config,
            policy: RetryPolicy::default(),
            require_primary: false,
        }
    }

    /// Set the polling budget.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Only count a status reply as ready once a member reports `PRIMARY`.
    #[must_use]
    pub fn with_require_primary(mut self, require_primary: bool) -> Self {
        self.require_primary = require_primary;
        self
    }

    /// The admin client.
    pub fn admin(&self) -> &A {
        &self.admin
    }

    /// Initiate the set once, then poll until ready or out of budget.
    ///
    /// Initiation is never retried: an error or a non-ok reply ends the run as
    /// `Failed` without polling.
    #[instrument(skip(self), fields(set = %self.config.id, members = self.config.members.len()))]
    pub async fn run(&self) -> PollOutcome {
        if let Err(e) = self.config.validate().and_then(|()| self.policy.validate()) {
            error!(error = %e, "❌ Refusing to initialize replica set");
            return PollOutcome::Failed {
                attempts: 0,
                reason: e.to_string(),
            };
        }

        match self.admin.initiate(&self.config).await {
            Ok(reply) if reply.is_ok() => {
                info!(reply = %reply, "Replica set initiation result");
                info!("✅ Replica set initialized successfully!");
            }
            Ok(reply) => {
                error!(reply = %reply, "❌ Failed to initialize replica set");
                return PollOutcome::Failed {
                    attempts: 0,
                    reason: format!("replSetInitiate returned {reply}"),
                };
            }
            Err(e) => {
                error!(error = %e, "❌ Error initializing replica set");
                return PollOutcome::Failed {
                    attempts: 0,
                    reason: e.to_string(),
                };
            }
        }

        info!(
            max_wait_secs = self.policy.worst_case_wait().as_secs(),
            "Waiting for replica set to stabilize..."
        );
        self.wait_until_ready().await
    }

    /// Poll `replSetGetStatus` until ready, a permanent error, or the budget runs out.
    ///
    /// Non-ready replies and transient errors sleep for the policy delay before the
    /// next attempt; the final attempt is not followed by a sleep.
    pub async fn wait_until_ready(&self) -> PollOutcome {
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            match self.admin.status().await {
                Ok(reply) if self.is_ready(&reply) => {
                    info!(
                        attempt,
                        set = ?reply.set_name(),
                        primary = ?reply.primary(),
                        "✅ Replica set is ready!"
                    );
                    debug!(status = %reply, "Replica set status");
                    return PollOutcome::Ready { attempts: attempt };
                }
                Ok(reply) => {
                    debug!(attempt, members = ?reply.member_states(), "Replica set not ready yet");
                }
                Err(e) => match e.class() {
                    ErrorClass::Transient => {
                        debug!(attempt, error = %e, "Status check failed, will retry");
                    }
                    ErrorClass::Permanent => {
                        error!(attempt, error = %e, "❌ Replica set status check failed");
                        return PollOutcome::Failed {
                            attempts: attempt,
                            reason: e.to_string(),
                        };
                    }
                },
            }

            info!("Attempt {attempt}/{max_attempts}: Waiting for replica set...");
            if attempt < max_attempts {
                tokio::time::sleep(self.policy.delay()).await;
            }
        }

        warn!(
            attempts = max_attempts,
            "⚠️  Replica set took longer than expected to initialize"
        );
        PollOutcome::TimedOut {
            attempts: max_attempts,
        }
    }

    fn is_ready(&self, reply: &CommandReply) -> bool {
        reply.is_ok() && (!self.require_primary || reply.primary().is_some())
    }
}
