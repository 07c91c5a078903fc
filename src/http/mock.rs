// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Scriptable transport for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::Result;

type Handler = Box<dyn FnMut(&HttpRequest) -> Result<HttpResponse> + Send>;

/// Transport that answers every request from a closure and records it.
pub(crate) struct MockTransport {
    handler: Mutex<Handler>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub(crate) fn new(
        handler: impl FnMut(&HttpRequest) -> Result<HttpResponse> + Send + 'static,
    ) -> Self {
        Self {
            handler: Mutex::new(Box::new(handler)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let mut handler = self.handler.lock().unwrap();
        (handler)(&request)
    }
}
