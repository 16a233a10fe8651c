//! Request generator.
//!
//! Expands the configured ranges once, optionally shuffles host order, and
//! streams `MultiPortScanRequest` units into a bounded channel from its own
//! task. The channel closes after the last unit.

use crate::config::{ScanConfiguration, ScanParams};
use crate::error::ConfigResult;
use crate::scanner::request::MultiPortScanRequest;
use crate::types::{enumerate_hosts, Port};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::net::IpAddr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Capacity of the generator's output queue.
pub const GENERATOR_QUEUE: usize = 1000;

/// Produces scan units for every host and port in a configuration.
#[derive(Debug, Clone)]
pub struct RequestGenerator {
    hosts: Vec<IpAddr>,
    ports: Vec<Port>,
    params: ScanParams,
    parallel_per_host: bool,
}

impl RequestGenerator {
    /// Expand the configuration's host ranges.
    ///
    /// Fails if any include or exclude block is malformed; no units are
    /// produced in that case.
    pub fn new(config: &ScanConfiguration) -> ConfigResult<Self> {
        let mut hosts = enumerate_hosts(&config.include_ranges, &config.exclude_ranges)?;

        if config.randomize_host_order {
            match config.seed {
                Some(seed) => hosts.shuffle(&mut StdRng::seed_from_u64(seed)),
                None => hosts.shuffle(&mut rand::thread_rng()),
            }
        }

        Ok(Self {
            hosts,
            ports: config.ports.clone(),
            params: config.params,
            parallel_per_host: config.parallel_per_host,
        })
    }

    /// Hosts in emission order.
    pub fn hosts(&self) -> &[IpAddr] {
        &self.hosts
    }

    /// Number of units this generator will emit.
    pub fn unit_count(&self) -> usize {
        if self.parallel_per_host {
            self.hosts.len() * self.ports.len()
        } else {
            self.hosts.len()
        }
    }

    /// Iterate over the units in emission order.
    pub fn units(&self) -> impl Iterator<Item = MultiPortScanRequest> + '_ {
        self.hosts.iter().flat_map(move |&host| {
            let units: Vec<MultiPortScanRequest> = if self.parallel_per_host {
                self.ports
                    .iter()
                    .map(|&port| MultiPortScanRequest::new(host, vec![port], self.params))
                    .collect()
            } else {
                vec![MultiPortScanRequest::new(host, self.ports.clone(), self.params)]
            };
            units
        })
    }

    /// Stream every unit from a spawned task.
    ///
    /// The task ends early, without error, once the receiver is dropped. It
    /// resolves to the number of units delivered.
    pub fn spawn(self, capacity: usize) -> (mpsc::Receiver<MultiPortScanRequest>, JoinHandle<u64>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let handle = tokio::spawn(async move {
            let mut sent = 0u64;
            for unit in self.units() {
                if tx.send(unit).await.is_err() {
                    debug!(sent, "generator stopped: downstream closed");
                    return sent;
                }
                sent += 1;
            }
            debug!(sent, "generator finished");
            sent
        });

        (rx, handle)
    }
}
