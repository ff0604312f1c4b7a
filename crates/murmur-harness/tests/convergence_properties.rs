//! Property-based convergence tests
//!
//! Two sessions in a group exchange random sends and revocations. Delivery
//! order is scrambled before either side drains its inbox.
//!
//! Properties:
//! 1. Both sides end with the same projected view
//! 2. Exactly the messages revoked by their senders show as revoked
//! 3. The same seed and operations always produce the same view

use murmur_core::{DisplayBody, DisplayMessage};
use murmur_harness::SimWorld;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Send { by_alice: bool },
    RevokeLast { by_alice: bool },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<bool>().prop_map(|by_alice| Op::Send { by_alice }),
        1 => any::<bool>().prop_map(|by_alice| Op::RevokeLast { by_alice }),
    ]
}

fn run(seed: u64, ops: &[Op], reverse: bool) -> (Vec<DisplayMessage>, Vec<DisplayMessage>) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    runtime.block_on(async {
        let world = SimWorld::new(seed);
        let (mut alice, alice_node) = world.session();
        let (mut bob, bob_node) = world.session();
        alice.init().await;
        bob.init().await;
        alice.join_group("room", None).await.unwrap();
        bob.join_group("room", None).await.unwrap();

        let mut last_alice = None;
        let mut last_bob = None;
        for (i, op) in ops.iter().enumerate() {
            match *op {
                Op::Send { by_alice: true } => {
                    last_alice = Some(alice.send_message("room", format!("a{i}")).await.unwrap());
                },
                Op::Send { by_alice: false } => {
                    last_bob = Some(bob.send_message("room", format!("b{i}")).await.unwrap());
                },
                Op::RevokeLast { by_alice: true } => {
                    if let Some(target) = last_alice.take() {
                        alice.revoke_message("room", &target).await.unwrap();
                    }
                },
                Op::RevokeLast { by_alice: false } => {
                    if let Some(target) = last_bob.take() {
                        bob.revoke_message("room", &target).await.unwrap();
                    }
                },
            }
        }

        if reverse {
            world.network.reverse_inbox(alice_node);
            world.network.reverse_inbox(bob_node);
        }
        alice.pump_inbound().await;
        bob.pump_inbound().await;

        (alice.view("room"), bob.view("room"))
    })
}

/// Revocations `run` actually issues: each revokes the sender's latest
/// unrevoked send, if any.
fn issued_revocations(ops: &[Op]) -> usize {
    let (mut alice_pending, mut bob_pending) = (false, false);
    let mut issued = 0;
    for op in ops {
        let pending = match *op {
            Op::Send { by_alice: true } => {
                alice_pending = true;
                continue;
            },
            Op::Send { by_alice: false } => {
                bob_pending = true;
                continue;
            },
            Op::RevokeLast { by_alice: true } => &mut alice_pending,
            Op::RevokeLast { by_alice: false } => &mut bob_pending,
        };
        if std::mem::take(pending) {
            issued += 1;
        }
    }
    issued
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_views_converge(
        seed in any::<u64>(),
        ops in prop::collection::vec(op_strategy(), 1..30),
        reverse in any::<bool>(),
    ) {
        let (on_alice, on_bob) = run(seed, &ops, reverse);
        prop_assert_eq!(on_alice, on_bob);
    }

    #[test]
    fn prop_revocations_match_requests(
        seed in any::<u64>(),
        ops in prop::collection::vec(op_strategy(), 1..30),
    ) {
        let (view, _) = run(seed, &ops, true);

        let revoked: Vec<_> = view.iter().filter(|entry| entry.revoked).collect();
        prop_assert_eq!(revoked.len(), issued_revocations(&ops));
        prop_assert!(revoked.iter().all(|entry| entry.body == DisplayBody::Revoked));
    }

    #[test]
    fn prop_replay_is_deterministic(
        seed in any::<u64>(),
        ops in prop::collection::vec(op_strategy(), 1..20),
        reverse in any::<bool>(),
    ) {
        prop_assert_eq!(run(seed, &ops, reverse), run(seed, &ops, reverse));
    }
}
