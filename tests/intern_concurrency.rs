//! Concurrent registration against one intern table.

use std::collections::HashSet;
use std::sync::Barrier;

use pixvault_core::StringTable;

#[test]
fn racing_threads_agree_on_every_id() {
    const THREADS: usize = 8;
    let names: Vec<String> = (0..500).map(|n| format!("tag-{n}")).collect();
    let table = StringTable::new();
    let barrier = Barrier::new(THREADS);

    let per_thread: Vec<Vec<(String, u32)>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|seed| {
                let (table, names, barrier) = (&table, &names, &barrier);
                scope.spawn(move || {
                    let mut order: Vec<&String> = names.iter().collect();
                    fastrand::Rng::with_seed(seed as u64).shuffle(&mut order);
                    barrier.wait();
                    order
                        .into_iter()
                        .map(|name| (name.clone(), table.register(name).expect("register")))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().expect("worker")).collect()
    });

    assert_eq!(table.len(), names.len());
    assert_eq!(table.max_id() as usize, names.len(), "ids are dense");
    let ids: HashSet<u32> = names.iter().filter_map(|name| table.get_id(name)).collect();
    assert_eq!(ids.len(), names.len());
    assert!(!ids.contains(&0));
    for results in per_thread {
        for (name, id) in results {
            assert_eq!(table.get_id(&name), Some(id), "{name}");
            assert_eq!(table.get_text(id).as_deref(), Some(name.as_str()));
        }
    }
}

#[test]
fn lookups_never_register() {
    let table = StringTable::new();
    assert_eq!(table.get_id("absent"), None);
    assert_eq!(table.get_text(0), None);
    assert!(table.is_empty());
    let id = table.register("present").expect("register");
    assert_eq!(table.register("present").expect("register"), id);
    assert_eq!(table.find_partial("res"), vec![id]);
}
