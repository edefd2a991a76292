use tracing::{info, warn};

/// Pin the calling thread to `core`. Best effort: on hosts with fewer cores
/// the thread stays unpinned and a warning is logged.
pub fn pin_current_thread(core: usize, context: &str) -> bool {
    let Some(cores) = core_affinity::get_core_ids() else {
        warn!("{} context: core ids unavailable, running unpinned", context);
        return false;
    };

    match cores.into_iter().find(|id| id.id == core) {
        Some(id) if core_affinity::set_for_current(id) => {
            info!("{} context pinned to core {}", context, core);
            true
        }
        _ => {
            warn!("{} context: cannot pin to core {}, running unpinned", context, core);
            false
        }
    }
}
