//! The Safety Validator Client core.
//!
//! A [`SafetyValidator`] owns a fixed capacity arena of client instances and
//! the stack wide instance id registry. It contains no threads and performs
//! no blocking calls: a periodic external caller drives it by invoking
//! [`produce`](SafetyValidator::produce) at least once per EPI per instance
//! and by delivering received Time Coordination replies through
//! [`handle_time_coordination`](SafetyValidator::handle_time_coordination).
//! All platform access goes through the [`SafetyClock`], [`SafetyTransport`]
//! and [`SafetyApplication`] collaborators.
//!
//! # Generics
//! A [`SafetyValidator`] is generic over:
//! * **`C`**: The [`SafetyClock`] supplying 128 µs tick system time
//! * **`T`**: The [`SafetyTransport`] the produced frames are handed to
//! * **`A`**: The [`SafetyApplication`] providing payload and observing
//!   events and errors

pub use registry::ValidatorRole;
pub use state::{ValidatorEvent, ValidatorState};

use instance::{ClientInstance, Consumer, InitInfo};
use registry::Registry;
use state::transition;

use crate::{
    application::SafetyApplication,
    clock::SafetyClock,
    config::{Cast, ClientOpenParams, InitialTimeData, Role, TimingConstants},
    crc::CrcSeeds,
    datastructures::{DataMessage, MAX_FRAME_LEN, MAX_LONG_PAYLOAD},
    error::{ErrorKind, Severity, ValidatorError},
    transport::SafetyTransport,
};

mod coldstart;
mod instance;
mod producer;
mod quarantine;
mod registry;
mod state;
mod tcoo;


/// Capacity of the client instance arena.
pub const MAX_CLIENT_INSTANCES: usize = 8;
/// Capacity of the server instance arena (servers are managed elsewhere; the
/// registry only records their ids).
pub const MAX_SERVER_INSTANCES: usize = 8;
/// Size of the stack wide instance id space.
pub const MAX_VALIDATOR_INSTANCES: usize = MAX_CLIENT_INSTANCES + MAX_SERVER_INSTANCES;
/// Most consumers a multicast connection can serve.
pub const MAX_CONSUMERS_MULTICAST: usize = 15;

/// Overall run state of the safety stack.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum StackState {
    #[default]
    Idle,
    Running,
}

/// Snapshot of an instance's configuration and state, for diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InstanceInfo {
    pub state: ValidatorState,
    pub format: crate::config::MessageFormat,
    pub max_consumer_number: u8,
    pub connection_point: u16,
    pub epi_us: u32,
    pub open_consumers: u8,
}

/// The producing side safety connection engine.
///
/// See the [module documentation](self) for the driving contract.
#[derive(Debug)]
pub struct SafetyValidator<C, T, A> {
    clock: C,
    transport: T,
    app: A,
    stack_state: StackState,
    registry: Registry,
    instances: [ClientInstance; MAX_CLIENT_INSTANCES],
    fault_counter: u16,
    /// Monotonically incremented offset mixed into generated initial time
    /// stamps so reopened multicast connections never start from the same
    /// seed.
    initial_ts_offset: u16,
    packet_buffer: [u8; MAX_FRAME_LEN],
    payload_buffer: [u8; MAX_LONG_PAYLOAD],
}

impl<C: SafetyClock, T: SafetyTransport, A: SafetyApplication> SafetyValidator<C, T, A> {
    /// Create the validator service with all instance slots unallocated.
    pub fn new(clock: C, transport: T, app: A) -> Self {
        Self {
            clock,
            transport,
            app,
            stack_state: StackState::default(),
            registry: Registry::default(),
            instances: core::array::from_fn(|_| ClientInstance::default()),
            fault_counter: 0,
            initial_ts_offset: 0,
            packet_buffer: [0; MAX_FRAME_LEN],
            payload_buffer: [0; MAX_LONG_PAYLOAD],
        }
    }

    /// Mark the stack as running; production is refused before this.
    pub fn set_running(&mut self) {
        self.stack_state = StackState::Running;
    }

    /// Return the stack to the idle state.
    pub fn halt(&mut self) {
        self.stack_state = StackState::Idle;
    }

    pub fn stack_state(&self) -> StackState {
        self.stack_state
    }

    /// Allocate a free client instance slot.
    ///
    /// The slot's entire sub-state is reinitialized before it is handed out.
    /// Returns `None` when all slots are in use.
    pub fn inst_alloc(&mut self) -> Option<usize> {
        let (index, slot) = self
            .instances
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| !slot.allocated)?;
        slot.clear();
        slot.allocated = true;
        log::debug!("allocated client instance slot {index}");
        Some(index)
    }

    /// Open a producing connection in the Target role.
    ///
    /// For an Extended format multicast Target the returned
    /// [`InitialTimeData`] is freshly generated and belongs in the
    /// Forward_Open response; for every other Extended combination the
    /// negotiated value from `params` is echoed. Base format returns `None`.
    pub fn init_target(
        &mut self,
        index: usize,
        instance_id: u16,
        params: ClientOpenParams,
    ) -> Result<Option<InitialTimeData>, ValidatorError> {
        self.client_init(index, instance_id, Role::Target, params)
    }

    /// Open a producing connection in the Originator role.
    pub fn init_originator(
        &mut self,
        index: usize,
        instance_id: u16,
        params: ClientOpenParams,
    ) -> Result<Option<InitialTimeData>, ValidatorError> {
        self.client_init(index, instance_id, Role::Originator, params)
    }

    fn client_init(
        &mut self,
        index: usize,
        instance_id: u16,
        role: Role,
        params: ClientOpenParams,
    ) -> Result<Option<InitialTimeData>, ValidatorError> {
        if index >= MAX_CLIENT_INSTANCES || !self.instances[index].allocated {
            return Err(self.report(ErrorKind::IndexOutOfRange, instance_id, index as u32));
        }

        let mut params = params;
        params.format.role = role;

        let consumer_bound = match params.format.cast {
            Cast::SingleCast => 1,
            Cast::MultiCast => MAX_CONSUMERS_MULTICAST as u8,
        };
        if params.max_consumer_number == 0 || params.max_consumer_number > consumer_bound {
            return Err(self.report(
                ErrorKind::ConsumerCountInvalid,
                instance_id,
                params.max_consumer_number as u32,
            ));
        }
        if !DataMessage::payload_len_valid(params.format, params.payload_len) {
            return Err(self.report(
                ErrorKind::PayloadSizeInvalid,
                instance_id,
                params.payload_len as u32,
            ));
        }
        let generates_initial_time = params.format.is_multicast() && params.format.is_target();
        if params.format.is_extended() && !generates_initial_time && params.initial_time.is_none() {
            return Err(self.report(ErrorKind::InitialTimeMissing, instance_id, 0));
        }
        let constants = match TimingConstants::new(&params) {
            Ok(constants) => constants,
            Err(kind) => return Err(self.report(kind, instance_id, params.epi_us())),
        };
        if let Err(kind) = self
            .registry
            .assign(instance_id, index, ValidatorRole::Client)
        {
            return Err(self.report(kind, instance_id, index as u32));
        }

        let inst = &mut self.instances[index];
        inst.init = Some(InitInfo {
            format: params.format,
            max_consumer_number: params.max_consumer_number,
            connection_point: params.connection_point,
            constants,
            payload_len: params.payload_len,
            pid_seeds: CrcSeeds::from_id(params.producer_id),
        });
        inst.consumers.clear();
        inst.consumers.push(Consumer::joined(
            params.timeout_multiplier,
            params.consumer_id,
        ));
        for _ in 1..params.max_consumer_number {
            inst.consumers.push(Consumer::default());
        }

        self.cold_start(index, instance_id, params.initial_time)
    }

    /// Add a consumer to an already open multicast connection.
    ///
    /// Repeats the per-consumer part of cold start for the joining consumer
    /// and reuses the connection's established rollover state for the
    /// Extended format reply. Rejoining a slot that is still quarantined is
    /// refused with a recoverable error, as is a reconnect into a live slot
    /// with parameters differing from the established ones.
    pub fn join_consumer(
        &mut self,
        instance_id: u16,
        consumer_num: u8,
        timeout_multiplier: crate::config::TimeoutMultiplier,
        consumer_id: crate::crc::ConnectionId,
    ) -> Result<Option<InitialTimeData>, ValidatorError> {
        let Some(index) = self.registry.client_index(instance_id) else {
            return Err(self.report(ErrorKind::InstanceIdInvalid, instance_id, 0));
        };
        let Some(init) = self.instances[index].init else {
            return Err(self.report(ErrorKind::InstanceIdInvalid, instance_id, 0));
        };
        if !init.format.is_multicast()
            || consumer_num == 0
            || consumer_num > init.max_consumer_number
        {
            return Err(self.report(
                ErrorKind::ConsumerNumOutOfRange,
                instance_id,
                consumer_num as u32,
            ));
        }

        let now = self.clock.now();
        let slot = consumer_num as usize - 1;
        let consumer = &self.instances[index].consumers[slot];
        if consumer.open && consumer.faulted {
            let expired = consumer
                .quarantine_expiry
                .map_or(false, |expiry| now.is_at_or_after(expiry));
            if !expired {
                return Err(self.report(
                    ErrorKind::ConsumerQuarantined,
                    instance_id,
                    consumer_num as u32,
                ));
            }
        }
        // A reconnect into a live slot must repeat the established parameters;
        // a mismatch leaves the slot untouched.
        if consumer.is_live()
            && (consumer.timeout_multiplier != timeout_multiplier || consumer.id != consumer_id)
        {
            return Err(self.report(
                ErrorKind::ReconnectMismatch,
                instance_id,
                consumer_num as u32,
            ));
        }

        self.mcast_reinit(index, instance_id, consumer_num, timeout_multiplier, consumer_id)
    }

    /// Close one consumer (or with `consumer_num == 0` all consumers) of an
    /// instance.
    ///
    /// With `stop` set, the instance is deallocated once this close empties
    /// it: always for single-cast, for multicast only when no consumer
    /// remains open and unfaulted. Deallocation fires `ClientClose` through
    /// the state machine if the instance is not already idle and removes the
    /// registry entry.
    pub fn close(
        &mut self,
        instance_id: u16,
        consumer_num: u8,
        stop: bool,
    ) -> Result<(), ValidatorError> {
        let Some(index) = self.registry.client_index(instance_id) else {
            return Err(self.report(ErrorKind::InstanceIdInvalid, instance_id, 0));
        };
        let Some(init) = self.instances[index].init else {
            return Err(self.report(ErrorKind::InstanceIdInvalid, instance_id, 0));
        };
        if consumer_num > init.max_consumer_number {
            return Err(self.report(
                ErrorKind::ConsumerNumOutOfRange,
                instance_id,
                consumer_num as u32,
            ));
        }

        // transport errors are the transport's to report; close proceeds
        self.transport.close_connection(instance_id, consumer_num);

        let inst = &mut self.instances[index];
        let mut left = false;
        if consumer_num == 0 {
            for consumer in &mut inst.consumers {
                consumer.open = false;
                consumer.quarantine_expiry = None;
            }
        } else {
            let consumer = &mut inst.consumers[consumer_num as usize - 1];
            left = consumer.open;
            consumer.open = false;
            consumer.quarantine_expiry = None;
        }
        if left && self.instances[index].state != ValidatorState::Idle {
            self.process_event(index, instance_id, ValidatorEvent::ConsumerLeave, consumer_num);
        }

        let inst = &self.instances[index];
        let empties = !init.format.is_multicast() || !inst.has_live_consumer();
        if stop && (consumer_num == 0 || empties) {
            if self.instances[index].state != ValidatorState::Idle {
                self.process_event(index, instance_id, ValidatorEvent::ClientClose, 0);
            }
            self.instances[index].clear();
            // id was resolved above, delete cannot fail
            let _ = self.registry.delete(instance_id);
            log::info!("instance {instance_id}: deallocated");
        }
        Ok(())
    }

    /// Close every open consumer of every allocated client instance with
    /// `stop` set.
    pub fn close_all(&mut self) {
        let mut clients: arrayvec::ArrayVec<u16, MAX_VALIDATOR_INSTANCES> =
            arrayvec::ArrayVec::new();
        clients.extend(self.registry.clients().map(|(instance_id, _)| instance_id));
        for instance_id in clients {
            // consumer number 0 closes all consumers of the instance
            let _ = self.close(instance_id, 0, true);
        }
    }

    /// Forward `event` to the application sink, then run the state machine.
    ///
    /// Invalid (state, event) pairs are fail-safe errors and leave the state
    /// unchanged. `consumer_num` is the consumer the event concerns, 0 for
    /// instance wide events.
    pub(crate) fn process_event(
        &mut self,
        index: usize,
        instance_id: u16,
        event: ValidatorEvent,
        consumer_num: u8,
    ) {
        self.app.validator_event(instance_id, event);

        let state = self.instances[index].state;
        match transition(state, event) {
            Ok(Some(next)) => {
                log::info!("instance {instance_id}: {state} -> {next} on {event:?}");
                self.instances[index].state = next;
            }
            Ok(None) => {}
            Err(_) => {
                self.report(ErrorKind::InvalidEvent, instance_id, u8::from(event) as u32);
                return;
            }
        }

        match event {
            ValidatorEvent::AllConsumersFaulted => {
                self.transport.close_connection(instance_id, consumer_num);
            }
            ValidatorEvent::ClientClose => {
                self.transport.close_connection(instance_id, 0);
            }
            _ => {}
        }
    }

    /// The single error reporting point.
    ///
    /// Records the error as the instance's last error (when the id resolves
    /// to a client) and unconditionally forwards it to the application error
    /// sink.
    pub(crate) fn report(
        &mut self,
        kind: ErrorKind,
        instance_id: u16,
        add_info: u32,
    ) -> ValidatorError {
        let error = ValidatorError::new(kind, instance_id, add_info);
        match error.severity() {
            Severity::FailSafe => log::error!("{error}"),
            Severity::Recoverable => log::warn!("{error}"),
        }
        if let Some(index) = self.registry.client_index(instance_id) {
            self.instances[index].last_error = Some(error);
        }
        self.app.error(&error);
        error
    }

    /// Set the multicast round robin pointer, range checked against the
    /// instance's consumer count.
    pub(crate) fn set_rr_consumer_index(
        &mut self,
        index: usize,
        instance_id: u16,
        value: u8,
    ) -> Result<(), ValidatorError> {
        let max = self.instances[index]
            .init
            .map(|init| init.max_consumer_number)
            .unwrap_or(0);
        if value > max {
            return Err(self.report(ErrorKind::RrIndexOutOfRange, instance_id, value as u32));
        }
        self.instances[index].runtime.rr_consumer_index = value;
        Ok(())
    }
}

/// Attribute getters, the CIP visible diagnostic surface.
impl<C, T, A> SafetyValidator<C, T, A> {
    /// Connection state of `instance_id`, or `None` for unknown/server ids.
    pub fn state_of(&self, instance_id: u16) -> Option<ValidatorState> {
        self.registry
            .client_index(instance_id)
            .map(|index| self.instances[index].state)
    }

    /// The role recorded for `instance_id`, or `None` if never assigned.
    pub fn role_of(&self, instance_id: u16) -> Option<ValidatorRole> {
        self.registry.role_of(instance_id)
    }

    /// Last error recorded for `instance_id`.
    pub fn last_error(&self, instance_id: u16) -> Option<ValidatorError> {
        self.registry
            .client_index(instance_id)
            .and_then(|index| self.instances[index].last_error)
    }

    /// Free running counter of client connection faults, wraps at 2^16.
    pub fn fault_counter(&self) -> u16 {
        self.fault_counter
    }

    pub fn reset_fault_counter(&mut self) {
        self.fault_counter = 0;
    }

    /// Configuration and state snapshot of `instance_id`.
    pub fn instance_info(&self, instance_id: u16) -> Option<InstanceInfo> {
        let index = self.registry.client_index(instance_id)?;
        let inst = &self.instances[index];
        let init = inst.init?;
        Some(InstanceInfo {
            state: inst.state,
            format: init.format,
            max_consumer_number: init.max_consumer_number,
            connection_point: init.connection_point,
            epi_us: init.constants.epi_us,
            open_consumers: inst.consumers.iter().filter(|c| c.open).count() as u8,
        })
    }

    /// Per-consumer time correction value in 128 µs ticks.
    pub fn consumer_time_correction(&self, instance_id: u16, consumer_num: u8) -> Option<u16> {
        self.consumer(instance_id, consumer_num)
            .map(|c| c.time_correction_ticks)
    }

    /// Ping intervals elapsed since the consumer's last Time Coordination
    /// reply.
    pub fn consumer_pings_since_tcoo(&self, instance_id: u16, consumer_num: u8) -> Option<u16> {
        self.consumer(instance_id, consumer_num)
            .map(|c| c.pings_since_last_tcoo)
    }

    pub fn consumer_active(&self, instance_id: u16, consumer_num: u8) -> Option<bool> {
        self.consumer(instance_id, consumer_num).map(|c| c.active)
    }

    pub fn consumer_faulted(&self, instance_id: u16, consumer_num: u8) -> Option<bool> {
        self.consumer(instance_id, consumer_num).map(|c| c.faulted)
    }

    fn consumer(&self, instance_id: u16, consumer_num: u8) -> Option<&Consumer> {
        let index = self.registry.client_index(instance_id)?;
        self.instances[index]
            .consumers
            .get(consumer_num.checked_sub(1)? as usize)
    }
}
