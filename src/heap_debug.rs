//! Heap statistics for diagnosing allocation pressure on core 1.

/// Log current heap statistics.
pub fn log_heap_stats(context: &str) {
    let free = esp_alloc::HEAP.free();
    let used = esp_alloc::HEAP.used();

    log::info!(
        "heap[{}]: used={}KB free={}KB (total={}KB)",
        context,
        used / 1024,
        free / 1024,
        (free + used) / 1024,
    );
}

/// Log a warning if the heap is getting low.
pub fn warn_if_low(threshold_kb: usize, context: &str) {
    let free_kb = esp_alloc::HEAP.free() / 1024;
    if free_kb < threshold_kb {
        log::warn!(
            "heap[{}]: LOW MEMORY - only {}KB free (threshold={}KB)",
            context,
            free_kb,
            threshold_kb
        );
    }
}
