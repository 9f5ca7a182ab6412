//! Boundary with the hypervisor parameter service.
//!
//! Setup asks for the console event channel first. A zero channel means the
//! guest simply has no console, which is reported as [`SetupError::NotConfigured`]
//! so callers can treat it as absence. Only then is the page frame queried; a
//! zero frame with a live channel is a malformed configuration.

use crate::config::ConsoleConfig;
use crate::error::SetupError;
use crate::notify::{EventNotifier, EventPort};
use crate::sched::Scheduler;
use crate::transport::ConsoleTransport;
use console_ring::{ConsolePage, PAGE_SHIFT};
use tracing::{debug, info};

/// HVM parameters the console depends on.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HvmParam {
    ConsolePfn = 17,
    ConsoleEventChannel = 18,
}

impl HvmParam {
    pub fn index(self) -> u32 {
        self as u32
    }
}

/// Negative status returned by a failed parameter query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamStatus(pub i32);

/// The opaque "get parameter" service.
pub trait ParamSource {
    fn get_param(&self, param: HvmParam) -> Result<u64, ParamStatus>;
}

impl<F> ParamSource for F
where
    F: Fn(HvmParam) -> Result<u64, ParamStatus>,
{
    fn get_param(&self, param: HvmParam) -> Result<u64, ParamStatus> {
        self(param)
    }
}

/// Validated location of the console page and its event channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConsoleParams {
    pub port: EventPort,
    pub page_address: usize,
}

impl ConsoleParams {
    pub fn discover<P: ParamSource + ?Sized>(source: &P) -> Result<Self, SetupError> {
        let raw_port = query(source, HvmParam::ConsoleEventChannel)?;
        if raw_port == 0 {
            debug!("no console event channel configured");
            return Err(SetupError::NotConfigured);
        }
        let port = u32::try_from(raw_port)
            .ok()
            .and_then(EventPort::new)
            .ok_or(SetupError::Malformed("event channel does not fit in 32 bits"))?;

        let pfn = query(source, HvmParam::ConsolePfn)?;
        if pfn == 0 {
            return Err(SetupError::Malformed("console page frame is zero"));
        }
        let page_address = pfn
            .checked_mul(1u64 << PAGE_SHIFT)
            .and_then(|address| usize::try_from(address).ok())
            .ok_or(SetupError::Malformed("console page frame is out of range"))?;

        Ok(Self { port, page_address })
    }

    /// Maps the discovered page and builds the guest transport.
    ///
    /// `make_notifier` binds the platform's send primitive to the discovered port.
    ///
    /// # Safety
    /// `page_address` must be directly addressable by this guest (identity
    /// mapped) and stay mapped for the lifetime of the returned transport, and
    /// no other transport may be attached to the same page.
    pub unsafe fn attach<N, S>(
        &self,
        make_notifier: impl FnOnce(EventPort) -> N,
        scheduler: S,
        config: ConsoleConfig,
    ) -> Result<ConsoleTransport<N, S>, SetupError>
    where
        N: EventNotifier,
        S: Scheduler,
    {
        let rings = ConsolePage::attach_address(self.page_address)?;
        info!(
            port = %self.port,
            page_address = self.page_address,
            "console session attached"
        );
        Ok(ConsoleTransport::with_scheduler(
            rings,
            make_notifier(self.port),
            scheduler,
            config,
        ))
    }
}

fn query<P: ParamSource + ?Sized>(source: &P, param: HvmParam) -> Result<u64, SetupError> {
    source
        .get_param(param)
        .map_err(|ParamStatus(status)| SetupError::ParamQuery { param, status })
}
