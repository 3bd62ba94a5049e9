use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

/// Map `f` over `items` on at most `jobs` threads.
///
/// Results come back in the order of `items` no matter which job finishes
/// first.
pub fn run_ordered<T, R, F>(jobs: usize, items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    let jobs = jobs.max(1).min(items.len());
    if jobs <= 1 {
        return items.iter().enumerate().map(|(idx, item)| f(idx, item)).collect();
    }

    let next = AtomicUsize::new(0);
    let results: Mutex<Vec<(usize, R)>> = Mutex::new(Vec::with_capacity(items.len()));

    std::thread::scope(|scope| {
        for _ in 0..jobs {
            scope.spawn(|| loop {
                let idx = next.fetch_add(1, Ordering::Relaxed);
                if idx >= items.len() {
                    return;
                }
                let result = f(idx, &items[idx]);
                results
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push((idx, result));
            });
        }
    });

    let mut results = results.into_inner().unwrap_or_else(|e| e.into_inner());
    results.sort_by_key(|(idx, _)| *idx);
    results.into_iter().map(|(_, result)| result).collect()
}
