mod common;

use anyhow::Result;
use glide_config::GlideConfig;
use glide_core::{
    ElementOptions, Engine, HeroGeometry, NodeId, PresetName, Rect, RunState, SpringParams,
    StyleMap, StyleProperty, TransitionConfig, TransitionEvent, TransitionRule, preset,
};

use common::{RecordingHost, run_frames, settle};

const LIST: NodeId = NodeId(1);
const DETAIL: NodeId = NodeId(2);
const THUMB: NodeId = NodeId(11);
const PHOTO: NodeId = NodeId(21);

fn morph_config(params: SpringParams) -> TransitionConfig {
    TransitionConfig::new().rule(TransitionRule::new("/", "/photo", move || {
        preset(PresetName::Fade, SpringParams::default()).with_shared_elements(params)
    }))
}

fn photo_host(photo_rect: Rect, detail_key: &str) -> RecordingHost {
    RecordingHost::new()
        .with_rect(THUMB, Rect::new(0.0, 0.0, 100.0, 100.0))
        .with_rect(PHOTO, photo_rect)
        .with_keys(LIST, &[("photo-1", THUMB)])
        .with_keys(DETAIL, &[(detail_key, PHOTO)])
}

fn navigate(engine: &mut Engine, host: &mut RecordingHost) -> Result<()> {
    engine.mount_view("/", LIST, host)?;
    engine.tick(16.0, host);
    engine.unmount_view("/", host)?;
    engine.mount_view("/photo", DETAIL, host)?;
    Ok(())
}

fn opacity(style: Option<&StyleMap>) -> f64 {
    style
        .and_then(|style| style.get(StyleProperty::Opacity))
        .and_then(|value| value.as_number())
        .unwrap_or(f64::NAN)
}

fn hero_pairs(events: &[TransitionEvent]) -> Vec<(String, NodeId, NodeId)> {
    events
        .iter()
        .filter_map(|event| match event {
            TransitionEvent::HeroPaired {
                key,
                from_node,
                to_node,
            } => Some((key.clone(), *from_node, *to_node)),
            _ => None,
        })
        .collect()
}

#[test]
fn photo_geometry_matches_worked_example() {
    let root = Rect::new(0.0, 0.0, 1000.0, 1000.0);
    let geometry = HeroGeometry::compute(
        Rect::new(0.0, 0.0, 100.0, 100.0),
        Rect::new(200.0, 50.0, 400.0, 300.0),
        root,
    );

    assert_eq!(geometry.scale, 4.0);
    assert_eq!(geometry.origin_delta, (200.0, 50.0));
    // Center delta: the top-left delta plus the change in half extents
    assert_eq!(geometry.translate, (350.0, 150.0));
}

#[test]
fn keyed_elements_are_paired_once_and_share_progress() -> Result<()> {
    let mut engine = Engine::new(morph_config(SpringParams::default()), &GlideConfig::default());
    let mut host = photo_host(Rect::new(200.0, 50.0, 400.0, 300.0), "photo-1");

    navigate(&mut engine, &mut host)?;
    let events: Vec<_> = engine.drain_events().collect();
    assert_eq!(
        hero_pairs(&events),
        vec![("photo-1".to_string(), THUMB, PHOTO)]
    );
    // Incoming side is placed over the outgoing one before the first frame
    assert_eq!(opacity(host.last_style(PHOTO)), 0.0);

    run_frames(&mut engine, &mut host, 5);
    let outgoing = opacity(host.last_style(THUMB));
    let incoming = opacity(host.last_style(PHOTO));
    assert!(incoming > 0.0 && incoming < 1.0);
    assert!((outgoing + incoming - 1.0).abs() < 1e-9);

    let sum = engine.runner().progress(THUMB).unwrap_or_default()
        + engine.runner().progress(PHOTO).unwrap_or_default();
    assert!((sum - 1.0).abs() < 1e-9);

    settle(&mut engine, &mut host);
    assert_eq!(host.detached, vec![LIST]);
    assert_eq!(engine.runner().state(PHOTO), RunState::Settled);
    // The outgoing element went away with its root
    assert_eq!(engine.runner().progress(THUMB), None);
    Ok(())
}

#[test]
fn keyed_element_registered_mid_morph_still_lands_visible() -> Result<()> {
    let mut engine = Engine::new(morph_config(SpringParams::default()), &GlideConfig::default());
    let mut host = photo_host(Rect::new(200.0, 50.0, 400.0, 300.0), "photo-1");
    navigate(&mut engine, &mut host)?;
    run_frames(&mut engine, &mut host, 2);

    let view = engine.view_scope("/photo").expect("detail view is mounted");
    let fade = preset(PresetName::Fade, SpringParams::default());
    engine.register_element("photo", PHOTO, ElementOptions::new(fade).in_scope(view), &mut host)?;
    assert!(engine.runner().in_pair(PHOTO));

    settle(&mut engine, &mut host);
    assert_eq!(opacity(host.last_style(PHOTO)), 1.0);
    assert_eq!(engine.runner().state(PHOTO), RunState::Settled);
    Ok(())
}

#[test]
fn correlation_keys_come_from_configured_attribute() -> Result<()> {
    let mut settings = GlideConfig::default();
    settings.hero.key_attribute = "data-shared".to_string();

    let mut engine = Engine::new(morph_config(SpringParams::default()), &settings);
    let mut host = photo_host(Rect::new(200.0, 50.0, 400.0, 300.0), "photo-1");
    navigate(&mut engine, &mut host)?;
    let events: Vec<_> = engine.drain_events().collect();
    assert!(hero_pairs(&events).is_empty());

    let mut engine = Engine::new(morph_config(SpringParams::default()), &settings);
    let mut host = photo_host(Rect::new(200.0, 50.0, 400.0, 300.0), "photo-1");
    host.key_attribute = "data-shared".to_string();
    navigate(&mut engine, &mut host)?;
    let events: Vec<_> = engine.drain_events().collect();
    assert_eq!(hero_pairs(&events).len(), 1);
    Ok(())
}

#[test]
fn old_root_outlives_a_slower_morph() -> Result<()> {
    let mut engine = Engine::new(
        morph_config(SpringParams::new(50.0, 10.0)),
        &GlideConfig::default(),
    );
    let mut host = photo_host(Rect::new(200.0, 50.0, 400.0, 300.0), "photo-1");
    navigate(&mut engine, &mut host)?;

    let mut frames = 0;
    while engine.runner().state(LIST) != RunState::Removed {
        engine.tick(16.0, &mut host);
        frames += 1;
        assert!(frames < 500, "view exit never finished");
    }
    assert!(engine.runner().is_running(THUMB));
    assert!(host.detached.is_empty());

    settle(&mut engine, &mut host);
    assert_eq!(host.detached, vec![LIST]);
    Ok(())
}

#[test]
fn one_sided_key_falls_back_to_plain_transition() -> Result<()> {
    let mut engine = Engine::new(morph_config(SpringParams::default()), &GlideConfig::default());
    let mut host = photo_host(Rect::new(200.0, 50.0, 400.0, 300.0), "photo-2");

    navigate(&mut engine, &mut host)?;
    let events: Vec<_> = engine.drain_events().collect();
    assert!(hero_pairs(&events).is_empty());
    assert!(!engine.runner().is_running(THUMB));

    settle(&mut engine, &mut host);
    assert_eq!(host.detached, vec![LIST]);
    Ok(())
}

#[test]
fn distant_pair_falls_back_to_plain_transition() -> Result<()> {
    let mut engine = Engine::new(morph_config(SpringParams::default()), &GlideConfig::default());
    // Centers 900px apart vertically, beyond the default limit
    let mut host = photo_host(Rect::new(0.0, 900.0, 100.0, 100.0), "photo-1");

    navigate(&mut engine, &mut host)?;
    let events: Vec<_> = engine.drain_events().collect();
    assert!(hero_pairs(&events).is_empty());
    Ok(())
}
