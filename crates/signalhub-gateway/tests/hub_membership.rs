#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use proptest::prelude::*;

use signalhub_gateway::config::LimitsSection;
use signalhub_gateway::realtime::{CloseReason, Connection, Hub};

#[derive(Debug, Clone)]
enum Op {
    Join(usize, usize),
    Leave(usize, usize),
    Disconnect(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..4usize, 0..3usize).prop_map(|(c, g)| Op::Join(c, g)),
        3 => (0..4usize, 0..3usize).prop_map(|(c, g)| Op::Leave(c, g)),
        1 => (0..4usize).prop_map(Op::Disconnect),
    ]
}

const GROUPS: [&str; 3] = ["alpha", "beta", "gamma"];

/// Both directions of the membership relation must describe the same pairs.
fn assert_consistent(hub: &Hub, conns: &[Arc<Connection>]) {
    let mut by_group: BTreeSet<(String, String)> = BTreeSet::new();
    for g in hub.groups().group_names() {
        let members = hub.members_of(&g);
        assert!(!members.is_empty(), "empty group {g} must be removed");
        for m in members {
            by_group.insert((m, g.clone()));
        }
    }

    let mut by_conn: BTreeSet<(String, String)> = BTreeSet::new();
    for c in conns {
        if let Ok(groups) = hub.groups_of(c.id()) {
            for g in groups {
                by_conn.insert((c.id().to_string(), g));
            }
        }
    }

    assert_eq!(by_group, by_conn);
}

proptest! {
    #[test]
    fn join_leave_keeps_views_consistent(ops in proptest::collection::vec(op(), 0..64)) {
        let hub = Hub::new(&LimitsSection::default());
        let conns: Vec<_> = (0..4).map(|_| {
            let c = hub.connect().unwrap();
            hub.handshake_ok(c.id()).unwrap();
            c
        }).collect();

        let mut model: HashMap<usize, BTreeSet<usize>> = HashMap::new();
        let mut gone: BTreeSet<usize> = BTreeSet::new();

        for op in ops {
            match op {
                Op::Join(c, g) => {
                    let res = hub.join(conns[c].id(), GROUPS[g]);
                    if gone.contains(&c) {
                        prop_assert!(res.is_err());
                    } else {
                        let newly = model.entry(c).or_default().insert(g);
                        prop_assert_eq!(res.unwrap(), newly);
                    }
                }
                Op::Leave(c, g) => {
                    let res = hub.leave(conns[c].id(), GROUPS[g]);
                    if gone.contains(&c) {
                        prop_assert!(res.is_err());
                    } else {
                        let was = model.entry(c).or_default().remove(&g);
                        prop_assert_eq!(res.unwrap(), was);
                    }
                }
                Op::Disconnect(c) => {
                    hub.disconnect(conns[c].id(), CloseReason::ClientClosed);
                    gone.insert(c);
                    model.remove(&c);
                }
            }
            assert_consistent(&hub, &conns);
        }

        for (c, groups) in &model {
            let mut got = hub.groups_of(conns[*c].id()).unwrap();
            got.sort();
            let mut want: Vec<String> = groups.iter().map(|g| GROUPS[*g].to_string()).collect();
            want.sort();
            prop_assert_eq!(got, want);
        }
    }
}

#[test]
fn concurrent_join_leave_stays_consistent() {
    let hub = Arc::new(Hub::new(&LimitsSection::default()));
    let conns: Vec<_> = (0..8)
        .map(|_| {
            let c = hub.connect().unwrap();
            hub.handshake_ok(c.id()).unwrap();
            c
        })
        .collect();

    let handles: Vec<_> = conns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let hub = Arc::clone(&hub);
            let id = c.id().to_string();
            std::thread::spawn(move || {
                for n in 0..200 {
                    let g = GROUPS[(i + n) % GROUPS.len()];
                    if n % 3 == 0 {
                        let _ = hub.leave(&id, g);
                    } else {
                        let _ = hub.join(&id, g);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_consistent(&hub, &conns);
}

#[test]
fn invalid_group_names_are_rejected() {
    let hub = Hub::new(&LimitsSection::default());
    let c = hub.connect().unwrap();
    assert!(hub.join(c.id(), "").is_err());
    assert!(hub.join(c.id(), &"x".repeat(500)).is_err());
    assert_eq!(hub.groups().group_count(), 0);
}
