//! ASF strategy: adaptive SRTT-based forwarding. Interests go to the
//! upstream with the best smoothed RTT; other upstreams are probed
//! periodically so the ranking stays current.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use log::trace;
use rust_ndnd_common::{Data, Interest, Name, NackReason};

use crate::face::FaceId;
use crate::runtime::Runtime;
use crate::tables::pit;

use super::strategy::{make_strategy_name, Strategy};
use super::Forwarder;

/// How often an alternate upstream is probed, per namespace.
const PROBE_INTERVAL: Duration = Duration::from_secs(60);

/// How long measurements stay alive past the last use.
const MEASUREMENTS_LIFETIME: Duration = Duration::from_secs(300);

#[derive(Default)]
struct FaceStats {
    srtt: Option<Duration>,
    n_timeouts: u32,
}

impl FaceStats {
    fn record_rtt(&mut self, rtt: Duration) {
        self.srtt = Some(match self.srtt {
            None => rtt,
            Some(srtt) => (srtt * 7 + rtt) / 8,
        });
        self.n_timeouts = 0;
    }

    /// Ranking key: measured upstreams first by SRTT, timing-out ones last.
    fn rank(&self) -> (u32, Duration) {
        (
            self.n_timeouts,
            self.srtt.unwrap_or(Duration::from_secs(3600)),
        )
    }
}

/// Per-namespace scratch on the Measurements table.
#[derive(Default)]
struct AsfInfo {
    faces: HashMap<FaceId, FaceStats>,
    last_probe: Option<Instant>,
}

/// Per-entry scratch: when the Interest left through each upstream.
#[derive(Default)]
struct AsfPitInfo {
    send_times: HashMap<FaceId, Instant>,
}

pub struct AsfStrategy {
    name: Name,
    runtime: Runtime,
}

impl AsfStrategy {
    pub const VERSION: u64 = 2;

    pub fn static_name() -> Name {
        make_strategy_name("asf", Self::VERSION)
    }

    pub fn new(runtime: Runtime) -> Self {
        Self {
            name: Self::static_name(),
            runtime,
        }
    }

    fn measurements_prefix(pit_entry: &Rc<RefCell<pit::Entry>>) -> Name {
        pit_entry.borrow().name().parent()
    }

    fn record_send(&self, pit_entry: &Rc<RefCell<pit::Entry>>, face: FaceId, now: Instant) {
        pit_entry
            .borrow_mut()
            .strategy_info
            .get_or_insert_with(AsfPitInfo::default)
            .send_times
            .insert(face, now);
    }
}

impl Strategy for AsfStrategy {
    fn name(&self) -> &Name {
        &self.name
    }

    fn after_receive_interest(
        &self,
        forwarder: &mut Forwarder,
        _ingress: FaceId,
        interest: &Interest,
        pit_entry: &Rc<RefCell<pit::Entry>>,
    ) {
        let candidates: Vec<FaceId> = {
            let entry = pit_entry.borrow();
            match forwarder.lookup_fib(&entry) {
                Some(fib_entry) => fib_entry
                    .borrow()
                    .next_hops()
                    .iter()
                    .filter(|nh| forwarder.can_forward_to(&entry, nh.face))
                    .map(|nh| nh.face)
                    .collect(),
                None => Vec::new(),
            }
        };
        if candidates.is_empty() {
            forwarder.send_nacks(pit_entry, NackReason::NoRoute, &[]);
            forwarder.on_interest_reject(pit_entry);
            return;
        }

        let now = forwarder.runtime().now();
        let prefix = Self::measurements_prefix(pit_entry);
        let accessor = forwarder.strategy_measurements(&self.name);
        let measurements = accessor.get(&prefix, now);

        // rank candidates by (timeouts, SRTT); unmeasured faces sort last
        // and get discovered through probing
        let (best, probe) = match &measurements {
            Some(entry) => {
                let mut ranked = candidates.clone();
                {
                    let entry = entry.borrow();
                    let info = entry.strategy_info.get::<AsfInfo>();
                    ranked.sort_by_key(|face| {
                        info.and_then(|info| info.faces.get(face))
                            .map(|stats| stats.rank())
                            .unwrap_or((u32::MAX, Duration::from_secs(3600)))
                    });
                }
                let best = ranked[0];

                let probe_due = {
                    let mut entry = entry.borrow_mut();
                    let info = entry.strategy_info.get_or_insert_with(AsfInfo::default);
                    let due = info
                        .last_probe
                        .map(|last| now.saturating_duration_since(last) >= PROBE_INTERVAL)
                        .unwrap_or(true);
                    if due && ranked.len() > 1 {
                        info.last_probe = Some(now);
                    }
                    due
                };
                let probe = if probe_due {
                    ranked.get(1).copied()
                } else {
                    None
                };
                (best, probe)
            }
            None => (candidates[0], None),
        };

        if let Some(entry) = &measurements {
            accessor.extend_lifetime(entry, MEASUREMENTS_LIFETIME, now);
        }

        if forwarder.on_outgoing_interest(pit_entry, best, false) {
            self.record_send(pit_entry, best, now);
        }
        if let Some(probe_face) = probe {
            trace!("asf: probing face {} for {}", probe_face, interest.name);
            if forwarder.on_outgoing_interest(pit_entry, probe_face, true) {
                self.record_send(pit_entry, probe_face, now);
            }
        }
    }

    fn before_satisfy_interest(
        &self,
        forwarder: &mut Forwarder,
        pit_entry: &Rc<RefCell<pit::Entry>>,
        ingress: FaceId,
        _data: &Data,
    ) {
        let now = self.runtime.now();
        let send_time = pit_entry
            .borrow()
            .strategy_info
            .get::<AsfPitInfo>()
            .and_then(|info| info.send_times.get(&ingress).copied());
        let Some(send_time) = send_time else {
            return;
        };
        let rtt = now.saturating_duration_since(send_time);

        let prefix = Self::measurements_prefix(pit_entry);
        let accessor = forwarder.strategy_measurements(&self.name);
        if let Some(entry) = accessor.get(&prefix, now) {
            entry
                .borrow_mut()
                .strategy_info
                .get_or_insert_with(AsfInfo::default)
                .faces
                .entry(ingress)
                .or_default()
                .record_rtt(rtt);
            accessor.extend_lifetime(&entry, MEASUREMENTS_LIFETIME, now);
        }
    }

    fn before_expire_pending_interest(
        &self,
        forwarder: &mut Forwarder,
        pit_entry: &Rc<RefCell<pit::Entry>>,
    ) {
        // every upstream that was tried and never answered counts a timeout
        let faces: Vec<FaceId> = pit_entry
            .borrow()
            .strategy_info
            .get::<AsfPitInfo>()
            .map(|info| info.send_times.keys().copied().collect())
            .unwrap_or_default();
        if faces.is_empty() {
            return;
        }
        let now = self.runtime.now();
        let prefix = Self::measurements_prefix(pit_entry);
        let accessor = forwarder.strategy_measurements(&self.name);
        if let Some(entry) = accessor.get(&prefix, now) {
            let mut entry = entry.borrow_mut();
            let info = entry.strategy_info.get_or_insert_with(AsfInfo::default);
            for face in faces {
                info.faces.entry(face).or_default().n_timeouts += 1;
            }
        }
    }
}
