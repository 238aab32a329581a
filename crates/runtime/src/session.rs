// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The execution session: exclusive access to one ready network plus at
//! most one registered observer.
//!
//! The session holds `&mut Network`, so a second concurrent session on the
//! same instance is a compile error rather than a runtime race. Observers
//! are borrowed for the session's lifetime and are readable again once the
//! session is closed.

use crate::engine::{NodeInfo, Ready};
use crate::executor::{Kernels, ReferenceKernels};
use crate::{EventMask, Network, NodeObserver, RuntimeError};

/// A run session over a ready network.
pub struct ExecSession<'s, 'a> {
    network: &'s mut Network<'a, Ready>,
    kernels: &'s dyn Kernels,
    observer: Option<(&'s mut dyn NodeObserver, EventMask)>,
    runs: usize,
}

impl<'s, 'a> ExecSession<'s, 'a> {
    pub fn new(network: &'s mut Network<'a, Ready>) -> Self {
        Self::with_kernels(network, &ReferenceKernels)
    }

    pub fn with_kernels(network: &'s mut Network<'a, Ready>, kernels: &'s dyn Kernels) -> Self {
        Self {
            network,
            kernels,
            observer: None,
            runs: 0,
        }
    }

    /// Registers `observer` for the events in `mask`.
    ///
    /// # Errors
    /// [`RuntimeError::Observer`] if an observer is already registered or
    /// the mask selects no events.
    pub fn register(
        &mut self,
        observer: &'s mut dyn NodeObserver,
        mask: EventMask,
    ) -> Result<(), RuntimeError> {
        if self.observer.is_some() {
            return Err(RuntimeError::Observer(
                "an observer is already registered for this session".into(),
            ));
        }
        if mask.is_empty() {
            return Err(RuntimeError::Observer("empty event mask".into()));
        }
        self.observer = Some((observer, mask));
        tracing::debug!(?mask, "observer registered");
        Ok(())
    }

    /// Removes the registered observer. Returns `false` if none was set.
    pub fn unregister(&mut self) -> bool {
        let had = self.observer.take().is_some();
        if had {
            tracing::debug!("observer unregistered");
        }
        had
    }

    pub fn is_observed(&self) -> bool {
        self.observer.is_some()
    }

    /// Runs one inference, notifying the registered observer.
    pub fn run(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, RuntimeError> {
        let observer = self
            .observer
            .as_mut()
            .map(|(obs, mask)| (&mut **obs as &mut dyn NodeObserver, *mask));
        let batch = self.network.run_with(self.kernels, observer, input, output)?;
        self.runs += 1;
        Ok(batch)
    }

    /// See [`Network::node_info`].
    pub fn node_info(&self, cursor: &mut NodeInfo) -> bool {
        self.network.node_info(cursor)
    }

    pub fn network(&self) -> &Network<'a, Ready> {
        &*self.network
    }

    pub fn network_mut(&mut self) -> &mut Network<'a, Ready> {
        &mut *self.network
    }

    /// Successful runs in this session.
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Ends the session, releasing the network and the observer.
    pub fn close(mut self) {
        self.unregister();
        tracing::debug!(runs = self.runs, "session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ImageSource;
    use crate::EventCounter;
    use model_ir::builtin;

    #[test]
    fn test_register_twice_is_rejected() {
        let bytes = builtin::connect4_image().unwrap();
        let mut acts = vec![0u8; 988];
        let mut net = Network::create(ImageSource::Xip(&bytes), true)
            .unwrap()
            .init(&mut acts)
            .unwrap();
        let mut a = EventCounter::default();
        let mut b = EventCounter::default();

        let mut session = ExecSession::new(&mut net);
        session.register(&mut a, EventMask::ALL).unwrap();
        assert!(matches!(
            session.register(&mut b, EventMask::ALL),
            Err(RuntimeError::Observer(_))
        ));
        assert!(session.unregister());
        assert!(!session.unregister());
    }

    #[test]
    fn test_empty_mask_is_rejected() {
        let bytes = builtin::connect4_image().unwrap();
        let mut acts = vec![0u8; 988];
        let mut net = Network::create(ImageSource::Xip(&bytes), true)
            .unwrap()
            .init(&mut acts)
            .unwrap();
        let mut a = EventCounter::default();
        let mut session = ExecSession::new(&mut net);
        assert!(matches!(
            session.register(&mut a, EventMask::NONE),
            Err(RuntimeError::Observer(_))
        ));
        assert!(!session.is_observed());
    }

    #[test]
    fn test_observed_runs() {
        let bytes = builtin::connect4_image().unwrap();
        let mut acts = vec![0u8; 988];
        let mut net = Network::create(ImageSource::Xip(&bytes), true)
            .unwrap()
            .init(&mut acts)
            .unwrap();
        let mut counter = EventCounter::default();
        {
            let mut session = ExecSession::new(&mut net);
            session.register(&mut counter, EventMask::ALL).unwrap();
            let mut out = [0u8; 28];
            for _ in 0..3 {
                assert_eq!(session.run(&[0u8; 588], &mut out).unwrap(), 1);
            }
            assert_eq!(session.runs(), 3);
            session.close();
        }
        assert_eq!(counter.pre, 15);
        assert_eq!(counter.post, 15);
        assert_eq!(counter.last_seen, 3);
    }
}
