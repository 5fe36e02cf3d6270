use super::{SourceKind, SubscriptionId};
use crate::actor::{
    Actor, ActorId, Context, Down, Flow, HandlerResult, LinkMode, RuntimeError, RuntimeHandle,
};
use crate::message::{Message, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Control message: `hub.subscribe(subscription, prefix, actor)`.
pub const SUBSCRIBE: &str = "hub.subscribe";

/// Control message: `hub.unsubscribe(subscription)`.
pub const UNSUBSCRIBE: &str = "hub.unsubscribe";

/// Cloneable handle to the hub actor.
///
/// Subscription ids are allocated on the handle, so `subscribe` returns
/// without waiting for the hub's turn.
#[derive(Clone)]
pub struct EventHub {
    runtime: RuntimeHandle,
    hub: ActorId,
    next_subscription: Arc<AtomicU64>,
}

impl EventHub {
    /// Spawn the hub as a root actor.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::ShuttingDown`] once the runtime is stopping.
    pub fn spawn(runtime: &RuntimeHandle) -> Result<Self, RuntimeError> {
        let hub = runtime.spawn_actor(HubActor::default())?;
        Ok(Self::attach(runtime.clone(), hub))
    }

    /// Spawn the hub as a child of the current actor.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::ShuttingDown`] once the runtime is stopping.
    pub fn spawn_child(ctx: &Context<'_>) -> Result<Self, RuntimeError> {
        let hub = ctx.spawn_actor(HubActor::default())?;
        Ok(Self::attach(ctx.runtime().clone(), hub))
    }

    fn attach(runtime: RuntimeHandle, hub: ActorId) -> Self {
        Self {
            runtime,
            hub,
            next_subscription: Arc::new(AtomicU64::new(1)),
        }
    }

    /// The hub actor's id.
    pub const fn id(&self) -> ActorId {
        self.hub
    }

    /// Deliver every event of `kind` to `subscriber` until unsubscribed or
    /// until `subscriber` terminates.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NoSuchActor`] if the hub is gone.
    pub fn subscribe(
        &self,
        kind: SourceKind,
        subscriber: ActorId,
    ) -> Result<SubscriptionId, RuntimeError> {
        let id = SubscriptionId::from_raw(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.runtime.send(
            self.hub,
            Message::new(
                SUBSCRIBE,
                vec![
                    subscription_value(id),
                    Value::from(kind.prefix()),
                    Value::from(subscriber),
                ],
            ),
        )?;
        Ok(id)
    }

    /// Cancel a subscription. Unknown ids are ignored by the hub.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NoSuchActor`] if the hub is gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<(), RuntimeError> {
        self.runtime
            .send(self.hub, Message::new(UNSUBSCRIBE, vec![subscription_value(id)]))
    }

    /// Route `event` to the subscribers of its source kind.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NoSuchActor`] if the hub is gone.
    pub fn publish(&self, event: Message) -> Result<(), RuntimeError> {
        self.runtime.send(self.hub, event)
    }
}

#[allow(clippy::cast_possible_wrap)]
const fn subscription_value(id: SubscriptionId) -> Value {
    Value::Int(id.as_u64() as i64)
}

fn subscription_from(value: Option<&Value>) -> Option<SubscriptionId> {
    value
        .and_then(Value::as_int)
        .and_then(|raw| u64::try_from(raw).ok())
        .map(SubscriptionId::from_raw)
}

#[derive(Default)]
struct HubActor {
    subscriptions: BTreeMap<SubscriptionId, (SourceKind, ActorId)>,
    monitored: HashSet<ActorId>,
}

impl HubActor {
    fn subscribe(&mut self, ctx: &Context<'_>, message: &Message) {
        let parsed = (
            subscription_from(message.arg(0)),
            message.str_arg(1),
            message.arg(2).and_then(ActorId::from_value),
        );
        let (Some(id), Some(prefix), Some(subscriber)) = parsed else {
            warn!(%message, "malformed subscribe request");
            return;
        };
        if self.monitored.insert(subscriber) && ctx.link(subscriber, LinkMode::Monitor).is_err() {
            self.monitored.remove(&subscriber);
            debug!(%subscriber, "subscriber already gone");
            return;
        }
        let kind = SourceKind::from_prefix(prefix);
        debug!(%id, %kind, %subscriber, "subscribed");
        self.subscriptions.insert(id, (kind, subscriber));
    }

    fn unsubscribe(&mut self, ctx: &Context<'_>, message: &Message) {
        let Some(id) = subscription_from(message.arg(0)) else {
            warn!(%message, "malformed unsubscribe request");
            return;
        };
        if let Some((_, subscriber)) = self.subscriptions.remove(&id) {
            debug!(%id, %subscriber, "unsubscribed");
            if !self.subscriptions.values().any(|(_, a)| *a == subscriber) {
                self.monitored.remove(&subscriber);
                ctx.unlink(subscriber);
            }
        }
    }

    fn forget(&mut self, subscriber: ActorId) {
        self.subscriptions.retain(|_, (_, a)| *a != subscriber);
        self.monitored.remove(&subscriber);
    }

    fn publish(&mut self, ctx: &Context<'_>, event: &Message) {
        let kind = SourceKind::of(event.name());
        let mut seen = HashSet::new();
        let targets: Vec<ActorId> = self
            .subscriptions
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, a)| *a)
            .filter(|a| seen.insert(*a))
            .collect();

        for subscriber in targets {
            if ctx.send(subscriber, event.clone()).is_err() {
                debug!(%subscriber, "dropping dead subscriber");
                self.forget(subscriber);
            }
        }
        trace!(event = event.name(), delivered = seen.len(), "published");
    }
}

impl Actor for HubActor {
    fn name(&self) -> &'static str {
        "event-hub"
    }

    fn handle(&mut self, ctx: &mut Context<'_>, message: Message) -> HandlerResult {
        match message.name() {
            SUBSCRIBE => self.subscribe(ctx, &message),
            UNSUBSCRIBE => self.unsubscribe(ctx, &message),
            _ => self.publish(ctx, &message),
        }
        Ok(Flow::Continue)
    }

    fn on_down(&mut self, _ctx: &mut Context<'_>, down: Down) -> HandlerResult {
        self.forget(down.id);
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Runtime, RuntimeConfig};
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn runtime() -> Runtime {
        Runtime::with_config(RuntimeConfig {
            workers: 2,
            shutdown_on_root_exit: false,
            ..RuntimeConfig::default()
        })
        .unwrap()
    }

    fn probe(rt: &RuntimeHandle) -> (ActorId, Receiver<Message>) {
        let (tx, rx) = unbounded();
        let id = rt
            .spawn(move |_ctx| Ok(tx), |tx: &mut Sender<Message>, _ctx, message| {
                if message.is("stop") {
                    return Ok(Flow::Stop);
                }
                let _ = tx.send(message);
                Ok(Flow::Continue)
            })
            .unwrap();
        (id, rx)
    }

    #[test]
    fn test_routes_by_prefix() {
        let rt = runtime();
        let hub = EventHub::spawn(&rt.handle()).unwrap();
        let (keys, key_rx) = probe(&rt);
        let (ticks, tick_rx) = probe(&rt);
        hub.subscribe(SourceKind::Input, keys).unwrap();
        hub.subscribe(SourceKind::Timer, ticks).unwrap();

        hub.publish(crate::message!("input.key", "ctrl+k")).unwrap();
        hub.publish(crate::message!("timer.tick", 1)).unwrap();
        hub.publish(Message::signal("fs.changed")).unwrap();

        assert!(key_rx.recv_timeout(TIMEOUT).unwrap().is("input.key"));
        assert!(tick_rx.recv_timeout(TIMEOUT).unwrap().is("timer.tick"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(key_rx.try_recv().is_err());
        assert!(tick_rx.try_recv().is_err());
    }

    #[test]
    fn test_each_event_seen_once() {
        let rt = runtime();
        let hub = EventHub::spawn(&rt.handle()).unwrap();
        let (sub, rx) = probe(&rt);
        hub.subscribe(SourceKind::Input, sub).unwrap();
        hub.subscribe(SourceKind::Input, sub).unwrap();

        for i in 0..10 {
            hub.publish(crate::message!("input.key", i)).unwrap();
        }
        for i in 0..10 {
            assert_eq!(rx.recv_timeout(TIMEOUT).unwrap().int_arg(0), Some(i));
        }
        std::thread::sleep(Duration::from_millis(20));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let rt = runtime();
        let hub = EventHub::spawn(&rt.handle()).unwrap();
        let (sub, rx) = probe(&rt);
        let id = hub.subscribe(SourceKind::Custom("lsp".into()), sub).unwrap();
        hub.publish(Message::signal("lsp.ready")).unwrap();
        assert!(rx.recv_timeout(TIMEOUT).unwrap().is("lsp.ready"));

        hub.unsubscribe(id).unwrap();
        hub.publish(Message::signal("lsp.ready")).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dead_subscriber_is_dropped() {
        let rt = runtime();
        let hub = EventHub::spawn(&rt.handle()).unwrap();
        let (dead, _dead_rx) = probe(&rt);
        let (live, rx) = probe(&rt);
        hub.subscribe(SourceKind::Input, dead).unwrap();
        hub.subscribe(SourceKind::Input, live).unwrap();

        rt.send(dead, Message::signal("stop")).unwrap();
        hub.publish(Message::signal("input.focus")).unwrap();
        assert!(rx.recv_timeout(TIMEOUT).unwrap().is("input.focus"));
        assert!(rt.is_alive(hub.id()));
    }
}
