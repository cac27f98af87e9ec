//! Management plane.
//!
//! Commands are Interests under `/localhost/nfd` (or `/localhop/nfd` for
//! single-hop router management) whose names encode module, verb, and
//! parameters. The dispatcher sits behind the internal face: the forwarder
//! routes management Interests to that face, the dispatcher authenticates
//! and executes them, and the status reply flows back through the normal
//! Data path. Status datasets are published as segmented Data with the
//! last segment marked by FinalBlockId.

pub mod control;
pub mod cs_manager;
pub mod face_manager;
pub mod fib_manager;
pub mod strategy_choice_manager;

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, trace, warn};
use rust_ndnd_common::tlv;
use rust_ndnd_common::{Data, Interest, LpPacket, Name};

use crate::face::{
    Face, GenericLinkService, InternalTransport, LinkServiceOptions, INTERNAL_FACE_ID,
};
use crate::fw::Forwarder;
use control::{make_segment_component, ControlParameters, ControlResponse};

/// Freshness granted to command responses and dataset segments.
const RESPONSE_FRESHNESS: Duration = Duration::from_secs(1);

/// Upper bound on the payload of one dataset segment.
const MAX_SEGMENT_PAYLOAD: usize = 4096;

/// Decides whether a command may run. The daemon consumes this as a
/// capability; the real signed-Interest validator lives outside the core.
pub trait CommandAuthenticator {
    fn authorize(&self, module: &str, verb: &str, interest: &Interest) -> bool;
}

/// Accepts every command; suitable when the internal face is reachable
/// from local trusted clients only.
pub struct AcceptAllAuthenticator;

impl CommandAuthenticator for AcceptAllAuthenticator {
    fn authorize(&self, _module: &str, _verb: &str, _interest: &Interest) -> bool {
        true
    }
}

/// Authorizes only the listed modules.
pub struct ModulePolicyAuthenticator {
    allowed: HashSet<String>,
}

impl ModulePolicyAuthenticator {
    pub fn new(allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

impl CommandAuthenticator for ModulePolicyAuthenticator {
    fn authorize(&self, module: &str, _verb: &str, _interest: &Interest) -> bool {
        self.allowed.contains(module)
    }
}

/// Creates the internal face, routes the management namespaces to it, and
/// returns the dispatcher bound to its client side.
pub fn attach_management(
    forwarder: &mut Forwarder,
    authenticator: Box<dyn CommandAuthenticator>,
) -> Dispatcher {
    let transport = InternalTransport::new();
    let outbox = transport.outbox();
    let options = LinkServiceOptions {
        allow_local_fields: true,
        ..LinkServiceOptions::default()
    };
    let link_service = GenericLinkService::new(options, forwarder.runtime().clone());
    forwarder.add_reserved_face(Face::new(link_service, Box::new(transport)), INTERNAL_FACE_ID);

    forwarder
        .fib()
        .add_or_update_next_hop(&Name::from_string("/localhost/nfd"), INTERNAL_FACE_ID, 0);
    forwarder
        .fib()
        .add_or_update_next_hop(&Name::from_string("/localhop/nfd"), INTERNAL_FACE_ID, 0);

    Dispatcher::new(outbox, authenticator)
}

pub struct Dispatcher {
    outbox: Rc<RefCell<VecDeque<Bytes>>>,
    authenticator: Box<dyn CommandAuthenticator>,
}

impl Dispatcher {
    pub fn new(
        outbox: Rc<RefCell<VecDeque<Bytes>>>,
        authenticator: Box<dyn CommandAuthenticator>,
    ) -> Self {
        Self {
            outbox,
            authenticator,
        }
    }

    /// Drains command Interests the forwarder routed to the internal face
    /// and feeds the responses back in. Run once per event-loop turn.
    pub fn process_pending(&mut self, forwarder: &mut Forwarder) {
        loop {
            let block = self.outbox.borrow_mut().pop_front();
            let Some(block) = block else {
                break;
            };
            let Some(interest) = decode_command_interest(&block) else {
                continue;
            };
            if let Some(response) = self.dispatch(forwarder, &interest) {
                let lp = LpPacket::from_fragment(response.to_wire());
                forwarder.receive_block(INTERNAL_FACE_ID, lp.to_wire(), 0);
            }
        }
    }

    /// Executes one management Interest and builds the reply Data.
    pub fn dispatch(&self, forwarder: &mut Forwarder, interest: &Interest) -> Option<Data> {
        let name = &interest.name;
        let in_scope = Name::from_string("/localhost/nfd").is_prefix_of(name)
            || Name::from_string("/localhop/nfd").is_prefix_of(name);
        if !in_scope {
            return None;
        }
        if name.len() < 4 {
            return Some(self.make_response(interest, ControlResponse::new(501, "unsupported")));
        }

        let module = String::from_utf8_lossy(name.get(2).unwrap().as_bytes()).into_owned();
        let verb = String::from_utf8_lossy(name.get(3).unwrap().as_bytes()).into_owned();

        if name.len() == 4 && (verb == "list" || verb == "info") {
            return self.handle_dataset(forwarder, interest, &module, &verb, None);
        }
        // a segment request that missed the store regenerates the dataset
        if name.len() == 5 && (verb == "list" || verb == "info") {
            if let Some(segment) = control::parse_segment_component(name.get(4).unwrap()) {
                return self.handle_dataset(forwarder, interest, &module, &verb, Some(segment));
            }
        }

        if !self.authenticator.authorize(&module, &verb, interest) {
            debug!("mgmt: unauthorized {}/{}", module, verb);
            return Some(self.make_response(interest, ControlResponse::new(403, "unauthorized")));
        }
        if name.len() < 5 {
            return Some(
                self.make_response(interest, ControlResponse::new(400, "missing parameters")),
            );
        }
        let parameters = match ControlParameters::decode(name.get(4).unwrap().as_bytes()) {
            Ok(parameters) => parameters,
            Err(error) => {
                debug!("mgmt: malformed parameters: {}", error);
                return Some(
                    self.make_response(interest, ControlResponse::new(400, "malformed parameters")),
                );
            }
        };

        trace!("mgmt: {}/{} {:?}", module, verb, parameters);
        let response = match (module.as_str(), verb.as_str()) {
            ("fib", "add-nexthop") => fib_manager::add_next_hop(forwarder, interest, &parameters),
            ("fib", "remove-nexthop") => {
                fib_manager::remove_next_hop(forwarder, interest, &parameters)
            }
            ("strategy-choice", "set") => {
                strategy_choice_manager::set(forwarder, &parameters)
            }
            ("strategy-choice", "unset") => {
                strategy_choice_manager::unset(forwarder, &parameters)
            }
            ("cs", "erase") => cs_manager::erase(forwarder, &parameters),
            _ => ControlResponse::new(501, "unsupported verb"),
        };
        Some(self.make_response(interest, response))
    }

    fn handle_dataset(
        &self,
        forwarder: &mut Forwarder,
        interest: &Interest,
        module: &str,
        verb: &str,
        segment: Option<u64>,
    ) -> Option<Data> {
        let records = match (module, verb) {
            ("fib", "list") => fib_manager::list(forwarder),
            ("strategy-choice", "list") => strategy_choice_manager::list(forwarder),
            ("faces", "list") => face_manager::list(forwarder),
            ("cs", "info") => cs_manager::info(forwarder),
            _ => {
                return Some(
                    self.make_response(interest, ControlResponse::new(501, "unsupported")),
                )
            }
        };
        let prefix = interest.name.get_prefix(4);
        self.publish_dataset(forwarder, &prefix, records, segment.unwrap_or(0))
    }

    /// Splits `records` into segments, caches them all so follow-up
    /// Interests are answered from the store, and returns the requested
    /// one.
    fn publish_dataset(
        &self,
        forwarder: &mut Forwarder,
        prefix: &Name,
        records: Vec<u8>,
        requested: u64,
    ) -> Option<Data> {
        let payload = Bytes::from(records);
        let n_segments = (payload.len() / MAX_SEGMENT_PAYLOAD + 1) as u64;
        let mut segments = Vec::with_capacity(n_segments as usize);
        let final_block_id = make_segment_component(n_segments - 1);

        for number in 0..n_segments {
            let start = (number as usize) * MAX_SEGMENT_PAYLOAD;
            let end = (start + MAX_SEGMENT_PAYLOAD).min(payload.len());
            let segment = Data::new(
                prefix.appended(make_segment_component(number)),
                payload.slice(start..end),
            )
            .with_freshness_period(RESPONSE_FRESHNESS)
            .with_final_block_id(final_block_id.clone());
            segments.push(segment);
        }

        let now = forwarder.runtime().now();
        for segment in &segments {
            forwarder.cs().insert(segment.clone(), false, now);
        }
        segments.into_iter().nth(requested as usize)
    }

    fn make_response(&self, interest: &Interest, response: ControlResponse) -> Data {
        Data::new(interest.name.clone(), response.encode())
            .with_freshness_period(RESPONSE_FRESHNESS)
    }
}

/// Pulls a command Interest plus its IncomingFaceId tag out of one link
/// packet from the internal face.
fn decode_command_interest(block: &Bytes) -> Option<Interest> {
    let lp = match LpPacket::decode(block) {
        Ok(lp) => lp,
        Err(error) => {
            warn!("mgmt: link packet parse error ({}): DROP", error);
            return None;
        }
    };
    let fragment = lp.fragment.as_ref()?;
    if fragment.first() != Some(&tlv::TLV_INTEREST) || lp.nack.is_some() {
        return None;
    }
    match Interest::decode(fragment) {
        Ok(mut interest) => {
            interest.tags.incoming_face_id = lp.incoming_face_id;
            Some(interest)
        }
        Err(error) => {
            warn!("mgmt: Interest parse error ({}): DROP", error);
            None
        }
    }
}

/// Resolves the face a command targets: FaceId 0 means self-registration,
/// the ingress face of the signed Interest.
pub(crate) fn resolve_target_face(interest: &Interest, parameters: &ControlParameters) -> Option<u64> {
    match parameters.face_id.unwrap_or(0) {
        0 => interest.tags.incoming_face_id,
        id => Some(id),
    }
}
