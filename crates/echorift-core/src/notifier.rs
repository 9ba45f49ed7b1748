//! Collapse messages.
//!
//! The local message goes to every online actor in the zone's world whose
//! planar distance to the center is within the configured radius; the
//! global message is a broadcast. Each has its own toggle and both may fire
//! for the same collapse.

use std::sync::Arc;

use echorift_types::CollapseReason;
use tracing::debug;

use crate::config::SharedConfig;
use crate::host::{MessageSink, WorldHost, broadcast_message, send_message};
use crate::registry::CollapseObserver;
use crate::zone::Zone;

/// Sends collapse messages through the host surfaces.
pub struct CollapseNotifier {
    config: Arc<SharedConfig>,
    host: Arc<dyn WorldHost>,
    messages: Arc<dyn MessageSink>,
}

impl std::fmt::Debug for CollapseNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollapseNotifier").finish_non_exhaustive()
    }
}

impl CollapseNotifier {
    /// Create a notifier.
    pub fn new(
        config: Arc<SharedConfig>,
        host: Arc<dyn WorldHost>,
        messages: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            config,
            host,
            messages,
        }
    }
}

impl CollapseObserver for CollapseNotifier {
    fn on_collapse(&self, zone: &Zone, reason: CollapseReason) {
        let config = self.config.current();
        let points = &config.points;

        if points.collapse_local {
            let radius_sq = points.local_message_radius * points.local_message_radius;
            let mut told = 0_u32;
            for actor in self.host.online_actors() {
                let Some(pos) = self.host.actor_position(actor) else {
                    continue;
                };
                if pos.world != zone.world() {
                    continue;
                }
                if pos.planar_distance_sq(zone.center_x(), zone.center_z()) <= radius_sq {
                    send_message(self.messages.as_ref(), actor, &config.messages.collapse_local);
                    told = told.saturating_add(1);
                }
            }
            debug!(zone_id = %zone.id(), reason = %reason, actors = told, "Local collapse message sent");
        }

        if points.collapse_global {
            broadcast_message(self.messages.as_ref(), &config.messages.collapse_global);
        }
    }
}
