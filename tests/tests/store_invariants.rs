//! Key-pair store invariants across arbitrary operation sequences and reboots

use std::collections::BTreeMap;

use proptest::prelude::*;
use zbsec_api::IeeeAddr;
use zbsec_store::record;
use zbsec_store::{
    EntryAttributes, KeyAttribute, KeyClass, KeyFilter, KeyPairStore, LogStructuredMemory,
};
use zbsec_tests::fixtures::SharedLog;

const CAPACITY: u16 = 16;

#[derive(Debug, Clone)]
enum Op {
    Upsert { peer: u8, attribute: u8, key: u8 },
    Verify { peer: u8 },
    Delete { peer: u8 },
    DeleteAll { peer: u8 },
    SendFrame { peer: u8 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..3, 0u8..4, any::<u8>()).prop_map(|(peer, attribute, key)| Op::Upsert { peer, attribute, key }),
        1 => (0u8..3).prop_map(|peer| Op::Verify { peer }),
        1 => (0u8..3).prop_map(|peer| Op::Delete { peer }),
        1 => (0u8..3).prop_map(|peer| Op::DeleteAll { peer }),
        2 => (0u8..3).prop_map(|peer| Op::SendFrame { peer }),
    ]
}

fn addr(peer: u8) -> IeeeAddr {
    IeeeAddr::from_u64(0x00CC_0000_0000_0000 | peer as u64)
}

fn apply(store: &mut KeyPairStore, op: &Op) {
    // NotFound is an expected answer for several operations here
    let _ = match *op {
        Op::Upsert { peer, attribute, key } => store
            .upsert(
                addr(peer),
                &[key; 16],
                &EntryAttributes::with_attribute(KeyAttribute::from_bits(attribute)),
            )
            .map(|_| ()),
        Op::Verify { peer } => store.verify(addr(peer)).map(|_| ()),
        Op::Delete { peer } => store.delete(addr(peer)),
        Op::DeleteAll { peer } => store.delete_all_for(addr(peer)).map(|_| ()),
        Op::SendFrame { peer } => store.next_outgoing_counter(addr(peer)).map(|_| ()),
    };
}

type View = BTreeMap<(IeeeAddr, u8), (KeyAttribute, [u8; 16])>;

fn view(store: &KeyPairStore) -> View {
    store
        .iter()
        .map(|(_, e)| {
            let class = match e.class() {
                KeyClass::Primary => 0,
                KeyClass::Unverified => 1,
            };
            ((e.peer_long_address, class), (e.key_attribute, *e.link_key()))
        })
        .collect()
}

fn assert_two_entry_invariant(store: &KeyPairStore) {
    let mut per_class: BTreeMap<(IeeeAddr, u8), usize> = BTreeMap::new();
    for (_, entry) in store.iter() {
        let class = u8::from(entry.class() == KeyClass::Unverified);
        *per_class.entry((entry.peer_long_address, class)).or_default() += 1;
    }
    assert!(per_class.values().all(|&n| n == 1), "{per_class:?}");
    let mut per_peer: BTreeMap<IeeeAddr, usize> = BTreeMap::new();
    for (addr, _) in per_class.keys() {
        *per_peer.entry(*addr).or_default() += 1;
    }
    assert!(per_peer.values().all(|&n| n <= 2));
}

proptest! {
    #[test]
    fn at_most_one_entry_per_class(ops in prop::collection::vec(op(), 1..40)) {
        let mut store = KeyPairStore::new(CAPACITY, Box::new(LogStructuredMemory::new()));
        for op in &ops {
            apply(&mut store, op);
            assert_two_entry_invariant(&store);
        }
        for peer in 0..3 {
            if let Some(entry) = store.lookup(addr(peer), KeyFilter::Any) {
                // lookup prefers the primary entry
                let has_primary = store
                    .lookup(addr(peer), KeyFilter::Class(KeyClass::Primary))
                    .is_some();
                prop_assert_eq!(entry.class() == KeyClass::Primary, has_primary);
            }
        }
    }

    #[test]
    fn reboot_restores_the_same_table(ops in prop::collection::vec(op(), 1..40)) {
        let log = SharedLog::new();
        let mut store = KeyPairStore::new(CAPACITY, log.handle());
        let mut sent: BTreeMap<IeeeAddr, u32> = BTreeMap::new();
        for op in &ops {
            match *op {
                Op::SendFrame { peer } => {
                    if let Ok(counter) = store.next_outgoing_counter(addr(peer)) {
                        sent.insert(addr(peer), counter);
                    }
                }
                Op::Upsert { peer, .. }
                | Op::Verify { peer }
                | Op::Delete { peer }
                | Op::DeleteAll { peer } => {
                    // the key may have changed, restarting its counters
                    sent.remove(&addr(peer));
                    apply(&mut store, op);
                }
            }
        }

        let restored = KeyPairStore::restore(CAPACITY, Box::new(log.reboot())).unwrap();
        prop_assert_eq!(view(&restored), view(&store));

        // counters handed out before the reboot are never reused
        let mut restored = restored;
        for (peer, last) in sent {
            let next = restored.next_outgoing_counter(peer).unwrap();
            prop_assert!(next > last, "{} <= {}", next, last);
        }
    }
}

#[test]
fn torn_write_leaves_previous_record() {
    let log = SharedLog::new();
    let mut store = KeyPairStore::new(CAPACITY, log.handle());
    let peer = addr(1);
    store
        .upsert(peer, &[0x11; 16], &EntryAttributes::with_attribute(KeyAttribute::Verified))
        .unwrap();
    let slot = store.lookup_slot(peer, KeyFilter::Any).unwrap();

    // power fails while the replacement key is being programmed
    let mut replacement = store.lookup(peer, KeyFilter::Any).unwrap().clone();
    replacement.key_attribute = KeyAttribute::Provisional;
    let raw = record::encode(&replacement);
    for written in [0, 1, 3, raw.len() / 2, raw.len()] {
        let image = log.with(|l| {
            let mut copy = LogStructuredMemory::from_image(l.image().to_vec());
            copy.write_torn(slot, &raw, written);
            copy.image().to_vec()
        });
        let restored =
            KeyPairStore::restore(CAPACITY, Box::new(LogStructuredMemory::from_image(image))).unwrap();
        let entry = restored.lookup(peer, KeyFilter::Any).unwrap();
        assert_eq!(entry.key_attribute, KeyAttribute::Verified, "torn after {written} bytes");
        assert_eq!(entry.link_key(), &[0x11; 16]);
        assert_eq!(restored.len(), 1);
    }
}

#[test]
fn full_store_refuses_without_evicting() {
    let mut store = KeyPairStore::new(2, Box::new(LogStructuredMemory::new()));
    let attrs = EntryAttributes::with_attribute(KeyAttribute::Verified);
    store.upsert(addr(0), &[1; 16], &attrs).unwrap();
    store.upsert(addr(1), &[2; 16], &attrs).unwrap();
    assert!(store.upsert(addr(2), &[3; 16], &attrs).is_err());
    assert_eq!(store.len(), 2);
    // merging into an existing class needs no free slot
    store.upsert(addr(0), &[4; 16], &attrs).unwrap();
    assert_eq!(store.lookup(addr(0), KeyFilter::Any).unwrap().link_key(), &[4; 16]);
}
