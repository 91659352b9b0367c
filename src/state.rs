//! Connection lifecycle state machine.
//!
//! A tagged union plus a pure transition function, independent of the
//! transport and of any UI layer so it can be unit-tested in isolation.
//! The pipeline owns the single instance; external collaborators only see
//! the read-only session query on [`crate::app::Pipeline`].

use crate::session::Session;
use thiserror::Error;

/// Why a connection ended. Internal handling is identical for both causes;
/// the distinction only feeds user-facing messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectCause {
    /// The application asked for the disconnect.
    Requested,
    /// The peripheral dropped the link on its own.
    Unexpected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Idle,
    Scanning,
    Connecting { device_id: String },
    /// Link is up but notifications are not flowing: either the
    /// subscription has not happened yet, or it failed and left the
    /// connection degraded ("connected but not receiving data") rather
    /// than rolling it back. [`ConnectionState::Subscribed`] alone means
    /// samples are arriving.
    Connected { session: Session },
    Subscribed { session: Session },
}

impl ConnectionState {
    /// Session metadata, when a device is connected.
    pub fn session(&self) -> Option<&Session> {
        match self {
            ConnectionState::Connected { session }
            | ConnectionState::Subscribed { session } => Some(session),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Scanning => "Scanning",
            ConnectionState::Connecting { .. } => "Connecting",
            ConnectionState::Connected { .. } => "Connected",
            ConnectionState::Subscribed { .. } => "Subscribed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    ScanStarted,
    ScanStopped,
    ConnectRequested { device_id: String },
    ConnectFailed,
    /// Connect succeeded; carries the freshly built session so the
    /// transition function stays pure.
    Connected { session: Session },
    SubscribeSucceeded,
    SubscribeFailed,
    Disconnected { cause: DisconnectCause },
}

impl ConnectionEvent {
    fn name(&self) -> &'static str {
        match self {
            ConnectionEvent::ScanStarted => "ScanStarted",
            ConnectionEvent::ScanStopped => "ScanStopped",
            ConnectionEvent::ConnectRequested { .. } => "ConnectRequested",
            ConnectionEvent::ConnectFailed => "ConnectFailed",
            ConnectionEvent::Connected { .. } => "Connected",
            ConnectionEvent::SubscribeSucceeded => "SubscribeSucceeded",
            ConnectionEvent::SubscribeFailed => "SubscribeFailed",
            ConnectionEvent::Disconnected { .. } => "Disconnected",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("already connected to {device_id}; disconnect first")]
    AlreadyConnected { device_id: String },
    #[error("a connect to {device_id} is already in flight")]
    ConnectInFlight { device_id: String },
    #[error("event {event} is not valid in state {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },
}

/// Compute the next state for an event.
///
/// Connect requests are serialized: a second request while one is in flight
/// or while a device is connected is rejected, never queued. Disconnects are
/// accepted from every state so `disconnect` stays safe to call at any time.
pub fn transition(
    state: &ConnectionState,
    event: ConnectionEvent,
) -> Result<ConnectionState, StateError> {
    use ConnectionEvent as E;
    use ConnectionState as S;

    match (state, event) {
        (S::Idle | S::Scanning, E::ScanStarted) => Ok(S::Scanning),
        (S::Scanning, E::ScanStopped) => Ok(S::Idle),

        (S::Idle | S::Scanning, E::ConnectRequested { device_id }) => {
            Ok(S::Connecting { device_id })
        }
        (S::Connecting { device_id }, E::ConnectRequested { .. }) => {
            Err(StateError::ConnectInFlight {
                device_id: device_id.clone(),
            })
        }
        (S::Connected { session } | S::Subscribed { session }, E::ConnectRequested { .. }) => {
            Err(StateError::AlreadyConnected {
                device_id: session.device_id.clone(),
            })
        }

        (S::Connecting { .. }, E::Connected { session }) => Ok(S::Connected { session }),
        (S::Connecting { .. }, E::ConnectFailed) => Ok(S::Idle),

        (S::Connected { session }, E::SubscribeSucceeded) => Ok(S::Subscribed {
            session: session.clone(),
        }),
        (S::Connected { session }, E::SubscribeFailed) => Ok(S::Connected {
            session: session.clone(),
        }),

        // Any path out of a live or pending connection lands in Idle and
        // destroys the session. Disconnected in Idle/Scanning is a no-op so
        // callers never have to guard a disconnect.
        (S::Connecting { .. } | S::Connected { .. } | S::Subscribed { .. }, E::Disconnected { .. }) => {
            Ok(S::Idle)
        }
        (S::Idle, E::Disconnected { .. }) => Ok(S::Idle),
        (S::Scanning, E::Disconnected { .. }) => Ok(S::Scanning),

        (state, event) => Err(StateError::InvalidTransition {
            state: state.name(),
            event: event.name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_session;

    fn connected() -> ConnectionState {
        ConnectionState::Connected {
            session: test_session(),
        }
    }

    #[test]
    fn test_scan_cycle() {
        let state = transition(&ConnectionState::Idle, ConnectionEvent::ScanStarted).unwrap();
        assert_eq!(state, ConnectionState::Scanning);
        // starting a scan while scanning stays in Scanning
        let state = transition(&state, ConnectionEvent::ScanStarted).unwrap();
        assert_eq!(state, ConnectionState::Scanning);
        let state = transition(&state, ConnectionEvent::ScanStopped).unwrap();
        assert_eq!(state, ConnectionState::Idle);
    }

    #[test]
    fn test_connect_creates_session_on_success() {
        let state = transition(
            &ConnectionState::Scanning,
            ConnectionEvent::ConnectRequested {
                device_id: "dev-1".into(),
            },
        )
        .unwrap();
        assert_eq!(
            state,
            ConnectionState::Connecting {
                device_id: "dev-1".into()
            }
        );

        let session = test_session();
        let state = transition(
            &state,
            ConnectionEvent::Connected {
                session: session.clone(),
            },
        )
        .unwrap();
        assert_eq!(state.session(), Some(&session));
    }

    #[test]
    fn test_connect_failure_returns_to_idle() {
        let state = ConnectionState::Connecting {
            device_id: "dev-1".into(),
        };
        let state = transition(&state, ConnectionEvent::ConnectFailed).unwrap();
        assert_eq!(state, ConnectionState::Idle);
    }

    #[test]
    fn test_second_connect_while_in_flight_is_rejected() {
        let state = ConnectionState::Connecting {
            device_id: "dev-1".into(),
        };
        let err = transition(
            &state,
            ConnectionEvent::ConnectRequested {
                device_id: "dev-2".into(),
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            StateError::ConnectInFlight {
                device_id: "dev-1".into()
            }
        );
    }

    #[test]
    fn test_connect_while_connected_is_rejected() {
        let err = transition(
            &connected(),
            ConnectionEvent::ConnectRequested {
                device_id: "dev-2".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, StateError::AlreadyConnected { device_id } if device_id == "dev-1"));
    }

    #[test]
    fn test_subscribe_success_reaches_subscribed() {
        let state = transition(&connected(), ConnectionEvent::SubscribeSucceeded).unwrap();
        assert!(matches!(state, ConnectionState::Subscribed { .. }));
        assert!(state.session().is_some());
    }

    #[test]
    fn test_subscribe_failure_stays_connected_degraded() {
        let state = transition(&connected(), ConnectionEvent::SubscribeFailed).unwrap();
        // still Connected, never Subscribed: the connection survives but
        // "receiving" remains false
        assert!(
            matches!(&state, ConnectionState::Connected { .. }),
            "subscription failure must not roll back the connection"
        );
        assert!(!matches!(&state, ConnectionState::Subscribed { .. }));
        assert!(state.session().is_some());
    }

    #[test]
    fn test_disconnect_destroys_session_from_any_live_state() {
        for (state, cause) in [
            (connected(), DisconnectCause::Requested),
            (connected(), DisconnectCause::Unexpected),
            (
                ConnectionState::Subscribed {
                    session: test_session(),
                },
                DisconnectCause::Unexpected,
            ),
            (
                ConnectionState::Connecting {
                    device_id: "dev-1".into(),
                },
                DisconnectCause::Unexpected,
            ),
        ] {
            let next = transition(&state, ConnectionEvent::Disconnected { cause }).unwrap();
            assert_eq!(next, ConnectionState::Idle);
            assert!(next.session().is_none());
        }
    }

    #[test]
    fn test_disconnect_is_safe_when_idle() {
        let next = transition(
            &ConnectionState::Idle,
            ConnectionEvent::Disconnected {
                cause: DisconnectCause::Requested,
            },
        )
        .unwrap();
        assert_eq!(next, ConnectionState::Idle);
    }

    #[test]
    fn test_invalid_transition_is_reported() {
        let err = transition(&ConnectionState::Idle, ConnectionEvent::SubscribeSucceeded)
            .unwrap_err();
        assert_eq!(
            err,
            StateError::InvalidTransition {
                state: "Idle",
                event: "SubscribeSucceeded"
            }
        );
    }
}
