use serde::{Deserialize, Serialize};

use crate::message::MessageSet;
use crate::shared::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
    AwaitingCallback,
    Validated,
    Collecting,
    Collected,
    Error,
}

/// Tracks where one plugin instance stands in its contract.
///
/// ```text
/// Uninitialized -> Initialized -> (AwaitingCallback) -> Validated -> Collecting -> Collected
///                       any failing step -> Error
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Uninitialized,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    fn violation(&self, action: &'static str) -> DomainError {
        DomainError::Lifecycle {
            from: self.state,
            action,
        }
    }

    pub fn initialize(&mut self) -> Result<(), DomainError> {
        if self.state != LifecycleState::Uninitialized {
            return Err(self.violation("initialize"));
        }
        self.state = LifecycleState::Initialized;
        Ok(())
    }

    pub fn await_callback(&mut self) -> Result<(), DomainError> {
        if self.state != LifecycleState::Initialized {
            return Err(self.violation("await callback"));
        }
        self.state = LifecycleState::AwaitingCallback;
        Ok(())
    }

    /// Redirect flow finished: the connection is established.
    pub fn connect(&mut self) -> Result<(), DomainError> {
        match self.state {
            LifecycleState::Initialized | LifecycleState::AwaitingCallback => {
                self.state = LifecycleState::Validated;
                Ok(())
            }
            _ => Err(self.violation("connect")),
        }
    }

    /// Applies a validation outcome. Returns the blocking messages when the
    /// set holds at least one error; the state then stays `Initialized`.
    pub fn validated(&mut self, messages: &MessageSet) -> Result<Option<MessageSet>, DomainError> {
        if self.state != LifecycleState::Initialized {
            return Err(self.violation("validate"));
        }
        if !messages.passes() {
            return Ok(Some(messages.errors().cloned().collect()));
        }
        self.state = LifecycleState::Validated;
        Ok(None)
    }

    pub fn start_collect(&mut self) -> Result<(), DomainError> {
        if self.state != LifecycleState::Validated {
            return Err(self.violation("collect"));
        }
        self.state = LifecycleState::Collecting;
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), DomainError> {
        if self.state != LifecycleState::Collecting {
            return Err(self.violation("complete"));
        }
        self.state = LifecycleState::Collected;
        Ok(())
    }

    /// Any step may fail; an uninitialized instance has nothing to fail.
    pub fn fail(&mut self) -> Result<(), DomainError> {
        if self.state == LifecycleState::Uninitialized {
            return Err(self.violation("fail"));
        }
        self.state = LifecycleState::Error;
        Ok(())
    }

    pub fn results_readable(&self) -> bool {
        self.state == LifecycleState::Collected
    }

    pub fn state_readable(&self) -> bool {
        self.state != LifecycleState::Uninitialized
    }
}
