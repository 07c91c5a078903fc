// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sibling tasks joined as one unit.
//!
//! The first failure cancels the group's token. Tasks already talking to
//! the remote service are not aborted; they see the token at their next
//! cancellation check. Every failure is kept: one is returned as itself,
//! two or more as [`AggregateError`].

use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{AggregateError, Error, Result};

pub struct TaskGroup<T> {
    tasks: JoinSet<(usize, Result<T>)>,
    token: CancellationToken,
    spawned: usize,
}

impl<T: Send + 'static> TaskGroup<T> {
    /// New group whose token is a child of `parent`.
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            token: parent.child_token(),
            spawned: 0,
        }
    }

    /// Token tasks should check before irreversible calls.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let index = self.spawned;
        self.spawned += 1;
        self.tasks.spawn(async move { (index, task.await) });
    }

    /// Wait for every task. Successes come back in spawn order.
    pub async fn join(mut self) -> Result<Vec<T>> {
        let mut successes = Vec::with_capacity(self.spawned);
        let mut errors = Vec::new();

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((index, Ok(value))) => successes.push((index, value)),
                Ok((index, Err(error))) => {
                    debug!(task = index, error = %error, "Sibling task failed");
                    self.token.cancel();
                    errors.push(error);
                }
                Err(join_error) if join_error.is_panic() => {
                    std::panic::resume_unwind(join_error.into_panic())
                }
                Err(_) => {
                    self.token.cancel();
                    errors.push(Error::Cancelled);
                }
            }
        }

        // Tasks that only stopped because a sibling failed are not failures
        // of their own.
        if errors.iter().any(|error| !matches!(error, Error::Cancelled)) {
            errors.retain(|error| !matches!(error, Error::Cancelled));
        } else if !errors.is_empty() {
            return Err(Error::Cancelled);
        }

        match errors.len() {
            0 => {
                successes.sort_by_key(|(index, _)| *index);
                Ok(successes.into_iter().map(|(_, value)| value).collect())
            }
            1 => Err(errors.remove(0)),
            _ => Err(AggregateError::new(errors).into()),
        }
    }
}
