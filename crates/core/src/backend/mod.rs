use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::voice::Waveform;

/// Opaque identifier for one synthesis voice inside a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoiceHandle(pub u64);

/// Contract between the engine and an audio synthesis backend.
///
/// Implementations own the actual DSP; the engine only ever commands a
/// frequency, an envelope attack/release, and a waveform per voice. All
/// calls are expected to return promptly; latency and buffering are the
/// backend's concern.
pub trait AudioBackend {
    /// Name used when reporting failures.
    fn name(&self) -> &'static str;

    fn create_voice(&mut self, waveform: Waveform) -> Result<VoiceHandle>;
    fn set_frequency(&mut self, handle: VoiceHandle, hz: f32) -> Result<()>;
    fn trigger_attack(&mut self, handle: VoiceHandle) -> Result<()>;
    fn trigger_release(&mut self, handle: VoiceHandle) -> Result<()>;
    fn set_waveform(&mut self, handle: VoiceHandle, waveform: Waveform) -> Result<()>;
    fn destroy(&mut self, handle: VoiceHandle) -> Result<()>;
}

/// Handles binding one engine voice to the backend stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendVoice {
    pub primary: VoiceHandle,
    pub secondary: Option<VoiceHandle>,
}

/// A primary backend plus an optional secondary layered on top.
///
/// The secondary is a capability resolved once at construction. Its first
/// failing call disables it for the rest of the session with a single
/// report; primary failures are returned to the caller, which reports and
/// continues — no backend condition may stop the render tick.
pub struct BackendStack {
    primary: Box<dyn AudioBackend>,
    secondary: Option<Box<dyn AudioBackend>>,
}

impl BackendStack {
    pub fn new(primary: Box<dyn AudioBackend>, secondary: Option<Box<dyn AudioBackend>>) -> Self {
        if secondary.is_none() {
            debug!("secondary audio backend unavailable; continuing with primary only");
        }
        Self { primary, secondary }
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    pub fn create_voice(&mut self, waveform: Waveform) -> Result<BackendVoice> {
        let primary = self.primary.create_voice(waveform)?;
        let secondary = self.on_secondary("create_voice", |b| b.create_voice(waveform));
        Ok(BackendVoice { primary, secondary })
    }

    pub fn set_frequency(&mut self, voice: &BackendVoice, hz: f32) -> Result<()> {
        if let Some(handle) = voice.secondary {
            self.on_secondary("set_frequency", |b| b.set_frequency(handle, hz));
        }
        self.primary.set_frequency(voice.primary, hz)
    }

    pub fn trigger_attack(&mut self, voice: &BackendVoice) -> Result<()> {
        if let Some(handle) = voice.secondary {
            self.on_secondary("trigger_attack", |b| b.trigger_attack(handle));
        }
        self.primary.trigger_attack(voice.primary)
    }

    pub fn trigger_release(&mut self, voice: &BackendVoice) -> Result<()> {
        if let Some(handle) = voice.secondary {
            self.on_secondary("trigger_release", |b| b.trigger_release(handle));
        }
        self.primary.trigger_release(voice.primary)
    }

    pub fn set_waveform(&mut self, voice: &BackendVoice, waveform: Waveform) -> Result<()> {
        if let Some(handle) = voice.secondary {
            self.on_secondary("set_waveform", |b| b.set_waveform(handle, waveform));
        }
        self.primary.set_waveform(voice.primary, waveform)
    }

    pub fn destroy(&mut self, voice: &BackendVoice) -> Result<()> {
        if let Some(handle) = voice.secondary {
            self.on_secondary("destroy", |b| b.destroy(handle));
        }
        self.primary.destroy(voice.primary)
    }

    /// Runs an operation against the secondary backend if one is still
    /// enabled. A failure disables the secondary permanently.
    fn on_secondary<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut dyn AudioBackend) -> Result<T>,
    ) -> Option<T> {
        let backend = self.secondary.as_mut()?;
        match f(backend.as_mut()) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    backend = backend.name(),
                    operation,
                    error = %err,
                    "secondary audio backend failed; disabling it for this session"
                );
                self.secondary = None;
                None
            }
        }
    }
}

impl std::fmt::Debug for BackendStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendStack")
            .field("primary", &self.primary.name())
            .field("secondary", &self.secondary.as_ref().map(|b| b.name()))
            .finish()
    }
}

/// Operations observed by [`NullBackend`], in call order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackendCall {
    CreateVoice(VoiceHandle, Waveform),
    SetFrequency(VoiceHandle, f32),
    TriggerAttack(VoiceHandle),
    TriggerRelease(VoiceHandle),
    SetWaveform(VoiceHandle, Waveform),
    Destroy(VoiceHandle),
}

/// Backend that produces no sound but records every call it receives.
///
/// Used by hosts that run without audio output and by tests asserting the
/// engine's command stream. The call log is shared, so callers can keep a
/// [`CallLog`] view after the backend itself has been boxed into a
/// [`BackendStack`].
#[derive(Debug, Default)]
pub struct NullBackend {
    next_handle: u64,
    calls: Arc<Mutex<Vec<BackendCall>>>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view over the recorded calls.
    pub fn call_log(&self) -> CallLog {
        CallLog(self.calls.clone())
    }

    fn record(&self, call: BackendCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

/// Cloneable handle onto a [`NullBackend`]'s call history.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<BackendCall>>>);

impl CallLog {
    pub fn snapshot(&self) -> Vec<BackendCall> {
        self.0.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.0.lock() {
            calls.clear();
        }
    }
}

impl AudioBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn create_voice(&mut self, waveform: Waveform) -> Result<VoiceHandle> {
        let handle = VoiceHandle(self.next_handle);
        self.next_handle += 1;
        self.record(BackendCall::CreateVoice(handle, waveform));
        Ok(handle)
    }

    fn set_frequency(&mut self, handle: VoiceHandle, hz: f32) -> Result<()> {
        self.record(BackendCall::SetFrequency(handle, hz));
        Ok(())
    }

    fn trigger_attack(&mut self, handle: VoiceHandle) -> Result<()> {
        self.record(BackendCall::TriggerAttack(handle));
        Ok(())
    }

    fn trigger_release(&mut self, handle: VoiceHandle) -> Result<()> {
        self.record(BackendCall::TriggerRelease(handle));
        Ok(())
    }

    fn set_waveform(&mut self, handle: VoiceHandle, waveform: Waveform) -> Result<()> {
        self.record(BackendCall::SetWaveform(handle, waveform));
        Ok(())
    }

    fn destroy(&mut self, handle: VoiceHandle) -> Result<()> {
        self.record(BackendCall::Destroy(handle));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FreqGridError;

    /// Backend whose every call fails, for degradation tests.
    struct FailingBackend;

    impl AudioBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn create_voice(&mut self, _waveform: Waveform) -> Result<VoiceHandle> {
            Err(FreqGridError::Backend {
                backend: "failing",
                operation: "create_voice",
            })
        }

        fn set_frequency(&mut self, _handle: VoiceHandle, _hz: f32) -> Result<()> {
            Err(FreqGridError::Backend {
                backend: "failing",
                operation: "set_frequency",
            })
        }

        fn trigger_attack(&mut self, _handle: VoiceHandle) -> Result<()> {
            Err(FreqGridError::Backend {
                backend: "failing",
                operation: "trigger_attack",
            })
        }

        fn trigger_release(&mut self, _handle: VoiceHandle) -> Result<()> {
            Err(FreqGridError::Backend {
                backend: "failing",
                operation: "trigger_release",
            })
        }

        fn set_waveform(&mut self, _handle: VoiceHandle, _waveform: Waveform) -> Result<()> {
            Err(FreqGridError::Backend {
                backend: "failing",
                operation: "set_waveform",
            })
        }

        fn destroy(&mut self, _handle: VoiceHandle) -> Result<()> {
            Err(FreqGridError::Backend {
                backend: "failing",
                operation: "destroy",
            })
        }
    }

    #[test]
    fn failing_secondary_is_disabled_after_first_call() {
        let mut stack = BackendStack::new(
            Box::new(NullBackend::new()),
            Some(Box::new(FailingBackend)),
        );
        assert!(stack.has_secondary());

        let voice = stack.create_voice(Waveform::Sine).unwrap();
        assert!(!stack.has_secondary());
        assert!(voice.secondary.is_none());

        // Primary keeps servicing calls afterwards.
        stack.set_frequency(&voice, 440.0).unwrap();
        stack.trigger_attack(&voice).unwrap();
    }

    #[test]
    fn healthy_secondary_mirrors_primary_voice() {
        let mut stack = BackendStack::new(
            Box::new(NullBackend::new()),
            Some(Box::new(NullBackend::new())),
        );
        let voice = stack.create_voice(Waveform::Square).unwrap();
        assert!(voice.secondary.is_some());
        assert!(stack.has_secondary());
    }

    #[test]
    fn primary_failure_propagates_without_panicking() {
        let mut stack = BackendStack::new(Box::new(FailingBackend), None);
        assert!(stack.create_voice(Waveform::Sine).is_err());
    }

    #[test]
    fn null_backend_records_call_order() {
        let mut backend = NullBackend::new();
        let log = backend.call_log();
        let handle = backend.create_voice(Waveform::Triangle).unwrap();
        backend.set_frequency(handle, 330.0).unwrap();
        backend.trigger_attack(handle).unwrap();
        backend.destroy(handle).unwrap();

        assert_eq!(
            log.snapshot(),
            vec![
                BackendCall::CreateVoice(handle, Waveform::Triangle),
                BackendCall::SetFrequency(handle, 330.0),
                BackendCall::TriggerAttack(handle),
                BackendCall::Destroy(handle),
            ]
        );
    }
}
