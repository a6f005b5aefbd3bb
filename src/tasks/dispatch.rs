// Shakewatch - Dispatch Task
//
// Receives debounced shake events from the sensor task, attaches the latest
// classification snapshot when the session runs the audio classifier, and
// hands the notification to every registered sink. Ends when the sensor task
// drops its side of the channel.

use std::sync::mpsc::Receiver;

use crate::aggregate::LatestSnapshot;
use crate::events::{ShakeEvent, ShakeNotification};
use crate::sink::SinkRegistry;

pub fn dispatch_task(
    shake_rx: Receiver<ShakeEvent>,
    sinks: SinkRegistry,
    latest: Option<LatestSnapshot>,
) {
    log::info!("Dispatch task started");

    for event in shake_rx.iter() {
        let classifications = latest
            .as_ref()
            .map(|snapshot| snapshot.read().clone().unwrap_or_default());
        let notification = ShakeNotification::new(event, classifications);

        let delivered = sinks.deliver(&notification);
        log::debug!("Shake notification delivered to {} sink(s)", delivered);
    }

    log::info!("Dispatch task stopped");
}
