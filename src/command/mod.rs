//! Command Registry: the single funnel every command invocation goes through.
//!
//! Keybindings, programmatic calls and actors all end up in
//! [`CommandRegistry::dispatch`], which validates arguments against the
//! declared [`ArgShape`], logs the invocation and runs the handler.

mod builtin;
mod error;
mod registry;
mod shape;

pub use builtin::{Builtins, SET_MODE, STATUS_SHOW};
pub use error::CommandError;
pub use registry::{
    CommandContext, CommandDescriptor, CommandRegistry, CommandResult, HandlerError, Trigger,
};
pub use shape::{ArgKind, ArgShape};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Flow, Runtime, RuntimeConfig};
    use crate::message::Message;
    use crossbeam_channel::{unbounded, Sender};
    use std::time::Duration;

    #[test]
    fn test_builtins_route_to_actors() {
        let rt = Runtime::with_config(RuntimeConfig {
            workers: 2,
            shutdown_on_root_exit: false,
            ..RuntimeConfig::default()
        })
        .unwrap();
        let (tx, rx) = unbounded::<Message>();
        let sink = rt
            .spawn(move |_ctx| Ok(tx), |tx: &mut Sender<Message>, _ctx, message| {
                let _ = tx.send(message);
                Ok(Flow::Continue)
            })
            .unwrap();

        let registry = CommandRegistry::new();
        Builtins {
            runtime: rt.handle(),
            keymap: Some(sink),
            status: Some(sink),
        }
        .install(&registry);

        let trigger = Trigger::Programmatic;
        registry
            .dispatch("set_mode", &[crate::message::Value::from("insert")], &trigger)
            .unwrap();
        registry
            .dispatch_message(&crate::message!("status", "saved", 3), &trigger)
            .unwrap();

        let got = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(got.is(SET_MODE));
        assert_eq!(got.str_arg(0), Some("insert"));
        let got = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(got.is(STATUS_SHOW));
        assert_eq!(got.str_arg(0), Some("saved 3"));

        registry.dispatch("quit", &[], &trigger).unwrap();
        assert!(rt.wait_timeout(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn test_set_mode_without_keymap_fails() {
        let rt = Runtime::new().unwrap();
        let registry = CommandRegistry::new();
        Builtins {
            runtime: rt.handle(),
            keymap: None,
            status: None,
        }
        .install(&registry);

        let err = registry
            .dispatch("set_mode", &[crate::message::Value::from("x")], &Trigger::Programmatic)
            .unwrap_err();
        assert!(matches!(err, CommandError::Failed { .. }));
        assert!(registry.dispatch("noop", &[], &Trigger::Programmatic).is_ok());
    }
}
