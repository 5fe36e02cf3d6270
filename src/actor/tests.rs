use super::*;
use crate::message::Message;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(2);

fn runtime() -> Runtime {
    Runtime::with_config(RuntimeConfig {
        workers: 4,
        shutdown_on_root_exit: false,
        thread_name: "keel-test".to_string(),
    })
    .unwrap()
}

/// An actor forwarding everything it receives to a channel.
fn probe(rt: &RuntimeHandle) -> (ActorId, Receiver<Message>) {
    let (tx, rx) = unbounded();
    let id = rt
        .spawn(
            move |_ctx| Ok(tx),
            |tx: &mut Sender<Message>, _ctx, message| {
                let _ = tx.send(message);
                Ok(Flow::Continue)
            },
        )
        .unwrap();
    (id, rx)
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn raw_op(op: OpId) -> i64 {
    i64::try_from(op.as_u64()).unwrap()
}

fn failing(_: &mut (), _ctx: &mut Context<'_>, message: Message) -> HandlerResult {
    if message.is("boom") {
        return Err(ActorError::failed("boom"));
    }
    Ok(Flow::Continue)
}

fn next_down(rx: &Receiver<Message>) -> Down {
    loop {
        let message = rx.recv_timeout(TIMEOUT).unwrap();
        if let Some(down) = Down::from_message(&message) {
            return down;
        }
    }
}

#[test]
fn test_per_sender_fifo() {
    let rt = runtime();
    let (sink, rx) = probe(&rt);

    // Several senders interleave; each one's sequence must stay ordered.
    for sender in 0..4_i64 {
        rt.spawn(
            move |ctx| {
                for seq in 0..200_i64 {
                    ctx.send(sink, crate::message!("seq", sender, seq))?;
                }
                Ok(())
            },
            |_: &mut (), _ctx, _message| Ok(Flow::Continue),
        )
        .unwrap();
    }

    let mut last = [-1_i64; 4];
    for _ in 0..800 {
        let m = rx.recv_timeout(TIMEOUT).unwrap();
        let sender = usize::try_from(m.int_arg(0).unwrap()).unwrap();
        let seq = m.int_arg(1).unwrap();
        assert_eq!(seq, last[sender] + 1, "sender {sender} reordered");
        last[sender] = seq;
    }
    assert_eq!(last, [199; 4]);
}

#[derive(Default)]
struct TurnGuard {
    in_turn: AtomicBool,
    overlapped: AtomicBool,
    handled: AtomicUsize,
}

#[test]
fn test_turns_never_overlap() {
    let rt = runtime();
    let guard = Arc::new(TurnGuard::default());
    let state = Arc::clone(&guard);
    let target = rt
        .spawn(
            move |_ctx| Ok(state),
            |state: &mut Arc<TurnGuard>, _ctx, _message| {
                if state.in_turn.swap(true, Ordering::SeqCst) {
                    state.overlapped.store(true, Ordering::SeqCst);
                }
                std::thread::sleep(Duration::from_micros(200));
                state.handled.fetch_add(1, Ordering::SeqCst);
                state.in_turn.store(false, Ordering::SeqCst);
                Ok(Flow::Continue)
            },
        )
        .unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let handle = rt.handle();
            scope.spawn(move || {
                for seq in 0..50_i64 {
                    handle.send(target, crate::message!("work", seq)).unwrap();
                }
            });
        }
    });

    assert!(wait_until(|| guard.handled.load(Ordering::SeqCst) == 200));
    assert!(!guard.overlapped.load(Ordering::SeqCst), "two turns ran at once");
    assert!(!guard.in_turn.load(Ordering::SeqCst));
}

#[test]
fn test_send_to_terminated_actor() {
    let rt = runtime();
    let id = rt
        .spawn(
            |_ctx| Ok(()),
            |_: &mut (), _ctx, message| {
                Ok(if message.is("stop") {
                    Flow::Stop
                } else {
                    Flow::Continue
                })
            },
        )
        .unwrap();

    rt.send(id, Message::signal("stop")).unwrap();
    assert!(wait_until(|| rt.lifecycle(id) == Some(Lifecycle::Terminated)));
    assert_eq!(
        rt.send(id, Message::signal("ping")),
        Err(RuntimeError::NoSuchActor(id))
    );
    assert_eq!(rt.lifecycle(ActorId::from_raw(9_999)), None);
}

#[test]
fn test_ids_never_reused() {
    let rt = runtime();
    let a = rt.spawn(|_ctx| Ok(()), |_: &mut (), _ctx, _m| Ok(Flow::Stop)).unwrap();
    rt.send(a, Message::signal("stop")).unwrap();
    assert!(wait_until(|| !rt.is_alive(a)));
    let b = rt.spawn(|_ctx| Ok(()), |_: &mut (), _ctx, _m| Ok(Flow::Continue)).unwrap();
    assert!(b > a);
}

#[test]
fn test_monitor_receives_down() {
    let rt = runtime();
    let (sink, rx) = probe(&rt);
    let target = rt
        .spawn(
            |_ctx| Ok(()),
            |_: &mut (), _ctx, message| {
                if message.is("boom") {
                    return Err(ActorError::failed("boom"));
                }
                Ok(Flow::Continue)
            },
        )
        .unwrap();

    rt.spawn(
        move |ctx| {
            ctx.link(target, LinkMode::Monitor)?;
            ctx.send(sink, Message::signal("linked"))?;
            Ok(())
        },
        move |_: &mut (), ctx, message| {
            ctx.send(sink, message)?;
            Ok(Flow::Continue)
        },
    )
    .unwrap();

    assert!(rx.recv_timeout(TIMEOUT).unwrap().is("linked"));
    rt.send(target, Message::signal("boom")).unwrap();

    let down = next_down(&rx);
    assert_eq!(down.id, target);
    assert_eq!(down.reason, ExitReason::Error("boom".to_string()));
}

#[test]
fn test_bidirectional_link_propagates_abnormal_exit() {
    let rt = runtime();
    let (sink, rx) = probe(&rt);

    rt.spawn(
        move |ctx| {
            let a = ctx.spawn(|_ctx| Ok(()), failing)?;
            let b = ctx.spawn(|_ctx| Ok(()), failing)?;
            ctx.runtime().link(a, b, LinkMode::Bidirectional)?;
            ctx.send(a, Message::signal("boom"))?;
            Ok(a)
        },
        move |_: &mut ActorId, ctx, message| {
            ctx.send(sink, message)?;
            Ok(Flow::Continue)
        },
    )
    .unwrap();

    // Both children are monitored by the supervisor; arrival order is free.
    let mut downs = [next_down(&rx), next_down(&rx)];
    downs.sort_by_key(|down| down.reason.exit_code());
    let [failed, linked] = downs;
    assert_eq!(failed.reason, ExitReason::Error("boom".to_string()));
    assert_eq!(linked.reason, ExitReason::LinkedExit { peer: failed.id });
    assert_ne!(failed.id, linked.id);
}

#[test]
fn test_normal_exit_does_not_propagate() {
    let rt = runtime();
    let a = rt
        .spawn(|_ctx| Ok(()), |_: &mut (), _ctx, _m| Ok(Flow::Stop))
        .unwrap();
    let b = rt
        .spawn(|_ctx| Ok(()), |_: &mut (), _ctx, _m| Ok(Flow::Continue))
        .unwrap();
    rt.link(a, b, LinkMode::Bidirectional).unwrap();

    rt.send(a, Message::signal("stop")).unwrap();
    assert!(wait_until(|| !rt.is_alive(a)));
    std::thread::sleep(Duration::from_millis(20));
    assert!(rt.is_alive(b));
}

#[test]
fn test_panic_becomes_error_exit() {
    let rt = runtime();
    let (sink, rx) = probe(&rt);
    let victim = rt
        .spawn(
            |_ctx| Ok(()),
            |_: &mut (), _ctx, _message| -> HandlerResult { panic!("kaboom") },
        )
        .unwrap();
    rt.link(sink, victim, LinkMode::Monitor).unwrap();

    rt.send(victim, Message::signal("go")).unwrap();
    let down = next_down(&rx);
    assert_eq!(down.id, victim);
    match down.reason {
        ExitReason::Error(detail) => assert!(detail.contains("kaboom")),
        other => panic!("unexpected reason {other:?}"),
    }
}

#[test]
fn test_parent_exit_kills_children() {
    let rt = runtime();
    let (sink, rx) = probe(&rt);
    let parent = rt
        .spawn(
            move |ctx| {
                let child = ctx.spawn(|_ctx| Ok(()), |_: &mut (), _ctx, _m| Ok(Flow::Continue))?;
                ctx.send(sink, crate::message!("child", child))?;
                Ok(())
            },
            |_: &mut (), _ctx, _m| Ok(Flow::Continue),
        )
        .unwrap();

    let m = rx.recv_timeout(TIMEOUT).unwrap();
    let child = ActorId::from_value(m.arg(0).unwrap()).unwrap();
    assert!(rt.is_alive(child));

    rt.kill(parent).unwrap();
    assert!(wait_until(|| !rt.is_alive(child)));
}

#[test]
fn test_kill_preempts_queue() {
    let rt = runtime();
    let (sink, rx) = probe(&rt);
    rt.kill(sink).unwrap();
    for _ in 0..100 {
        let _ = rt.send(sink, Message::signal("late"));
    }
    assert!(wait_until(|| !rt.is_alive(sink)));
    assert!(rx.try_iter().all(|m| !m.is("late")));
}

#[test]
fn test_timer_delivers_and_cancel_suppresses() {
    let rt = runtime();
    let (sink, rx) = probe(&rt);
    rt.spawn(
        |ctx| {
            let late = ctx.send_after(Duration::from_millis(10), Message::signal("cancelled"));
            ctx.send_after(Duration::from_millis(40), Message::signal("fired"));
            ctx.cancel(late);
            assert!(!ctx.is_pending(late));
            Ok(())
        },
        move |_: &mut (), ctx, message| {
            assert!(ctx.operation().is_some());
            ctx.send(sink, message)?;
            Ok(Flow::Continue)
        },
    )
    .unwrap();

    let first = rx.recv_timeout(TIMEOUT).unwrap();
    assert!(first.is("fired"));
    assert!(rx.recv_timeout(Duration::from_millis(60)).is_err());
}

#[test]
fn test_completion_after_cancel_is_dropped() {
    let rt = runtime();
    let (sink, rx) = probe(&rt);
    let worker = rt
        .spawn(
            move |ctx| {
                let op = ctx.begin_operation();
                ctx.send(sink, crate::message!("op", raw_op(op)))?;
                Ok(())
            },
            move |_: &mut (), ctx, message| {
                ctx.send(sink, message)?;
                Ok(Flow::Continue)
            },
        )
        .unwrap();

    let m = rx.recv_timeout(TIMEOUT).unwrap();
    let op = OpId::new(u64::try_from(m.int_arg(0).unwrap()).unwrap());

    rt.cancel(worker, op).unwrap();
    rt.complete(worker, op, Message::signal("result")).unwrap();
    rt.send(worker, Message::signal("ping")).unwrap();

    // Mailbox order: the result is handled (and dropped) before the ping.
    assert!(rx.recv_timeout(TIMEOUT).unwrap().is("ping"));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_completion_of_pending_operation_is_handled() {
    let rt = runtime();
    let (sink, rx) = probe(&rt);
    let worker = rt
        .spawn(
            move |ctx| {
                let op = ctx.begin_operation();
                ctx.send(sink, crate::message!("op", raw_op(op)))?;
                Ok(())
            },
            move |_: &mut (), ctx, message| {
                let op = ctx.operation().map_or(0, raw_op);
                ctx.send(sink, crate::message!(message.name(), op))?;
                Ok(Flow::Continue)
            },
        )
        .unwrap();

    let m = rx.recv_timeout(TIMEOUT).unwrap();
    let raw = m.int_arg(0).unwrap();
    let op = OpId::new(u64::try_from(raw).unwrap());
    rt.complete(worker, op, Message::signal("result")).unwrap();

    let handled = rx.recv_timeout(TIMEOUT).unwrap();
    assert!(handled.is("result"));
    assert_eq!(handled.int_arg(0), Some(raw));

    // A second result for the same operation is stale.
    rt.complete(worker, op, Message::signal("again")).unwrap();
    rt.send(worker, Message::signal("ping")).unwrap();
    assert!(rx.recv_timeout(TIMEOUT).unwrap().is("ping"));
}

#[test]
fn test_reply_reaches_sender() {
    let rt = runtime();
    let (sink, rx) = probe(&rt);
    let echo = rt
        .spawn(
            |_ctx| Ok(()),
            |_: &mut (), ctx, message| {
                if ctx.reply(message.renamed("echo")).is_err() {
                    assert!(ctx.sender().is_none());
                }
                Ok(Flow::Continue)
            },
        )
        .unwrap();

    rt.spawn(
        move |ctx| {
            ctx.send(echo, Message::signal("hello"))?;
            Ok(())
        },
        move |_: &mut (), ctx, message| {
            ctx.send(sink, message)?;
            Ok(Flow::Continue)
        },
    )
    .unwrap();
    // From outside there is no sender to reply to.
    rt.send(echo, Message::signal("anonymous")).unwrap();

    assert!(rx.recv_timeout(TIMEOUT).unwrap().is("echo"));
}

#[test]
fn test_broadcast_reaches_link_set() {
    let rt = runtime();
    let (a, rx_a) = probe(&rt);
    let (b, rx_b) = probe(&rt);
    rt.spawn(
        move |ctx| {
            ctx.link(a, LinkMode::Monitor)?;
            ctx.link(b, LinkMode::Monitor)?;
            let reached = ctx.broadcast(&Message::signal("hello"));
            assert_eq!(reached, 2);
            Ok(())
        },
        |_: &mut (), _ctx, _m| Ok(Flow::Continue),
    )
    .unwrap();

    assert!(rx_a.recv_timeout(TIMEOUT).unwrap().is("hello"));
    assert!(rx_b.recv_timeout(TIMEOUT).unwrap().is("hello"));
}

#[test]
fn test_root_exit_sets_exit_status() {
    let rt = Runtime::with_config(RuntimeConfig {
        workers: 2,
        ..RuntimeConfig::default()
    })
    .unwrap();
    let root = rt
        .spawn(
            |_ctx| Ok(()),
            |_: &mut (), _ctx, _m| Err(ActorError::failed("fatal")),
        )
        .unwrap();
    rt.send(root, Message::signal("go")).unwrap();

    let status = rt.wait_timeout(TIMEOUT).ok().unwrap();
    assert_eq!(status.code(), 1);
    assert!(!status.success());
}

#[test]
fn test_shutdown_is_normal() {
    let rt = runtime();
    let _ = probe(&rt);
    rt.shutdown();
    assert!(rt.spawn(|_ctx| Ok(()), |_: &mut (), _ctx, _m| Ok(Flow::Continue)).is_err());
    let status = rt.wait_timeout(TIMEOUT).ok().unwrap();
    assert!(status.success());
    assert_eq!(status.code(), 0);
}

#[test]
fn test_failed_startup_terminates_actor() {
    let rt = runtime();
    let (sink, rx) = probe(&rt);
    rt.spawn(
        move |ctx| {
            let child = ctx.spawn(
                |_ctx| -> Result<(), ActorError> { Err(ActorError::failed("no config")) },
                |_: &mut (), _ctx, _m| Ok(Flow::Continue),
            )?;
            ctx.send(sink, crate::message!("child", child))?;
            Ok(())
        },
        move |_: &mut (), ctx, message| {
            ctx.send(sink, message)?;
            Ok(Flow::Continue)
        },
    )
    .unwrap();

    let down = next_down(&rx);
    assert_eq!(down.reason, ExitReason::Error("no config".to_string()));
}
