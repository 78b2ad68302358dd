//! Channel lifecycle tests against the simulated platform.
//!
//! Covers stop/cancel behaviour, exclusive hardware ownership and error
//! recovery for every channel through the public manager API.

use std::sync::Arc;
use std::time::Duration;

use timelock_core::channel::VisualSettings;
use timelock_core::platform::memory::{DeviceLog, SimulatedDevices, SimulatedPlatform};
use timelock_core::{
    ChannelError, ChannelKind, FireOutcome, NotificationManager, PlatformError, PresetName,
};

fn manager(devices: SimulatedDevices) -> (Arc<NotificationManager>, SimulatedPlatform) {
    let sim = SimulatedPlatform::new(devices);
    let manager = NotificationManager::new(sim.platform(), VisualSettings::default());
    (Arc::new(manager), sim)
}

#[tokio::test(start_paused = true)]
async fn stop_on_idle_channels_is_a_noop() {
    let (manager, sim) = manager(SimulatedDevices::default());

    for kind in ChannelKind::ALL {
        let channel = manager.channel(kind);
        channel.stop().await;
        channel.stop().await;
        assert!(!channel.is_active());
        assert_eq!(channel.live_handles(), 0);
    }

    assert_eq!(sim.log(), DeviceLog::default());
}

#[tokio::test(start_paused = true)]
async fn medium_flash_stopped_at_350ms_ends_dark() {
    let (manager, sim) = manager(SimulatedDevices::default());
    let torch = manager.channel(ChannelKind::Torch);

    let firing = {
        let torch = Arc::clone(&torch);
        tokio::spawn(async move { torch.fire_preset(PresetName::Medium).await })
    };
    tokio::time::sleep(Duration::from_millis(350)).await;
    torch.stop().await;
    let outcome = firing.await.unwrap().unwrap();

    assert_eq!(outcome, FireOutcome::Cancelled);
    let log = sim.log();
    assert_eq!(log.torch.last(), Some(&false));
    assert_eq!(log.torch, vec![true, false]);
    assert_eq!(log.streams_opened, 1);
    assert_eq!(log.open_streams(), 0);
    assert_eq!(torch.live_handles(), 0);
}

#[tokio::test(start_paused = true)]
async fn stopping_every_channel_mid_flight_releases_everything() {
    let (manager, sim) = manager(SimulatedDevices::default());

    let firing = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.fire_all(&ChannelKind::ALL, PresetName::Long).await })
    };
    tokio::time::sleep(Duration::from_millis(600)).await;
    manager.stop_all().await;
    let reports = firing.await.unwrap();

    assert!(reports
        .iter()
        .all(|r| r.outcome == Some(FireOutcome::Cancelled)));
    let log = sim.log();
    assert_eq!(log.open_streams(), 0);
    assert_eq!(log.mounted_overlays(), 0);
    assert_eq!(log.held_wake_locks(), 0);
    assert_eq!(log.opacity.last(), Some(&0.0));
    assert_eq!(log.torch.last(), Some(&false));
}

#[tokio::test(start_paused = true)]
async fn concurrent_fire_never_holds_two_handles() {
    let (manager, sim) = manager(SimulatedDevices::default());
    let torch = manager.channel(ChannelKind::Torch);

    let first = {
        let torch = Arc::clone(&torch);
        tokio::spawn(async move { torch.fire_preset(PresetName::Short).await })
    };
    let second = {
        let torch = Arc::clone(&torch);
        tokio::spawn(async move { torch.fire_preset(PresetName::Short).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(torch.live_handles() <= 1);
    assert!(sim.log().open_streams() <= 1);

    let mut outcomes = vec![
        first.await.unwrap().unwrap(),
        second.await.unwrap().unwrap(),
    ];
    outcomes.sort_by_key(|o| *o == FireOutcome::Rejected);

    assert_eq!(outcomes, vec![FireOutcome::Completed, FireOutcome::Rejected]);
    assert_eq!(sim.log().streams_opened, 1);
    assert_eq!(sim.log().open_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn double_stop_matches_single_stop() {
    let once = {
        let (manager, sim) = manager(SimulatedDevices::default());
        let torch = manager.channel(ChannelKind::Torch);
        let firing = {
            let torch = Arc::clone(&torch);
            tokio::spawn(async move { torch.fire_preset(PresetName::Medium).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        torch.stop().await;
        firing.await.unwrap().unwrap();
        let log = sim.log();
        assert_eq!(log.torch, vec![true, false]);
        log
    };

    let twice = {
        let (manager, sim) = manager(SimulatedDevices::default());
        let torch = manager.channel(ChannelKind::Torch);
        let firing = {
            let torch = Arc::clone(&torch);
            tokio::spawn(async move { torch.fire_preset(PresetName::Medium).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        torch.stop().await;
        torch.stop().await;
        firing.await.unwrap().unwrap();
        torch.stop().await;
        sim.log()
    };

    assert_eq!(once, twice);
    assert_eq!(twice.streams_released, 1);
}

#[tokio::test(start_paused = true)]
async fn denied_torch_leaves_nothing_behind_and_probe_still_works() {
    let (manager, sim) = manager(SimulatedDevices {
        camera_error: Some(PlatformError::PermissionDenied("camera access denied".into())),
        ..Default::default()
    });
    let torch = manager.channel(ChannelKind::Torch);

    let err = torch.fire_preset(PresetName::Short).await.unwrap_err();

    assert!(matches!(
        err,
        ChannelError::AcquisitionFailure {
            channel: ChannelKind::Torch,
            source: PlatformError::PermissionDenied(_),
        }
    ));
    assert_eq!(torch.live_handles(), 0);
    assert!(!torch.is_active());
    assert_eq!(sim.log().open_streams(), 0);
    assert!(torch.probe().await);

    // Once permission is granted the channel works again.
    sim.update_devices(|d| d.camera_error = None);
    assert_eq!(
        torch.fire_preset(PresetName::Short).await.unwrap(),
        FireOutcome::Completed
    );
}

#[tokio::test(start_paused = true)]
async fn haptic_and_visual_follow_the_same_pattern() {
    let (manager, sim) = manager(SimulatedDevices::default());

    let reports = manager
        .fire_all(&[ChannelKind::Haptic, ChannelKind::Visual], PresetName::Short)
        .await;

    assert!(reports.iter().all(|r| r.is_ok()));
    let log = sim.log();
    assert_eq!(log.vibrations, vec![200, 200]);
    assert_eq!(log.opacity.first(), Some(&0.0));
    assert_eq!(log.opacity.last(), Some(&0.0));
    assert_eq!(log.held_wake_locks(), 0);
    assert_eq!(log.mounted_overlays(), 0);
}
