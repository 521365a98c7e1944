//! End-to-end scenarios driving the whole manager through the in-memory
//! display and decoration service.

use framewm::config::{Config, WmAction};
use framewm::display::{buttons, modifiers, DisplayServer};
use framewm::event::WmEvent;
use framewm::testing::{FakeDecorations, FakeDisplay};
use framewm::types::{FrameId, Rect, WindowId};
use framewm::{WindowManager, WmError};

type Wm = WindowManager<FakeDisplay, FakeDecorations>;

fn config(layout: &str) -> Config {
    let mut config = Config::default();
    config.general.default_layout = layout.to_string();
    config
}

fn manager(layout: &str) -> Wm {
    WindowManager::new(FakeDisplay::new(1920, 1080), FakeDecorations::new(), &config(layout)).unwrap()
}

/// Map a client and let the service map the frame it created for it
fn open(wm: &mut Wm, wid: WindowId, size: (u32, u32)) -> FrameId {
    wm.display().add_window(wid, &format!("window {}", wid), &["XTerm"], size);
    wm.handle_event(WmEvent::MapRequest { window: wid }).unwrap();
    map_pending_frame(wm, wid)
}

fn map_pending_frame(wm: &mut Wm, wid: WindowId) -> FrameId {
    let fid = wm
        .pending_frames()
        .iter()
        .find_map(|(&fid, &w)| (w == wid).then_some(fid))
        .expect("no frame requested for window");
    wm.handle_event(WmEvent::MapRequest { window: fid }).unwrap();
    fid
}

/// Map a client as a tab of the focused frame
fn open_tab(wm: &mut Wm, wid: WindowId) {
    wm.execute_action(WmAction::ToggleNextIsTab).unwrap();
    wm.display().add_window(wid, &format!("window {}", wid), &["XTerm"], (0, 0));
    wm.handle_event(WmEvent::MapRequest { window: wid }).unwrap();
}

fn atom(wm: &Wm, name: &str) -> u32 {
    wm.display().intern_atom(name).unwrap()
}

#[test]
fn test_floating_tab_detach_and_close() {
    let mut wm = manager("floating");
    let a = open(&mut wm, 0x1, (0, 0));
    assert_eq!(wm.layout().frame_geometry(a), Some(Rect::new(560, 290, 800, 500)));

    open_tab(&mut wm, 0x2);
    assert_eq!(wm.layout().frame_geometry(a), Some(Rect::new(560, 290, 800, 500)));
    assert_eq!(wm.layout().frame(a).unwrap().active(), Some(0x2));
    assert_eq!(wm.decorations().active(a), Some(0x2));

    wm.execute_action(WmAction::DetachTab).unwrap();
    assert_eq!(wm.layout().frame(a).unwrap().history, vec![0x1]);
    assert_eq!(wm.decorations().tabs(a), vec![0x1]);
    let b = map_pending_frame(&mut wm, 0x2);
    assert_eq!(wm.layout().frame_geometry(b), Some(Rect::new(585, 315, 800, 500)));
    assert_eq!(wm.layout().frame_of(0x2), Some(b));

    wm.handle_event(WmEvent::DestroyNotify { window: 0x1 }).unwrap();
    assert!(!wm.layout().frame_exists(a));
    assert!(!wm.decorations().has_frame(a));
    assert_eq!(wm.layout().history(), &[b]);
    assert_eq!(wm.display().focused(), Some(0x2));
    assert!(wm.layout().validate().is_empty());
}

#[test]
fn test_tiled_three_frames() {
    let mut wm = manager("tiled");
    let frames: Vec<FrameId> = (1..=3).map(|wid| open(&mut wm, wid, (0, 0))).collect();

    assert_eq!(wm.layout().frame_geometry(frames[0]), Some(Rect::new(25, 25, 922, 1030)));
    let second = wm.layout().frame_geometry(frames[1]).unwrap();
    let third = wm.layout().frame_geometry(frames[2]).unwrap();
    assert_eq!((second.x, second.width), (972, 922));
    assert_eq!((third.x, third.width), (972, 922));
    assert_eq!(second.y, 25);
    assert_eq!(third.y, second.bottom() + 25);
    assert_eq!(third.bottom(), 1080 - 25);

    // Client content sits below the tab bar band
    assert_eq!(wm.display().geometry(0x1), Some(Rect::new(0, 34, 922, 996)));
}

#[test]
fn test_tab_dragged_to_another_frame_is_transferred() {
    let mut wm = manager("tiled");
    let a = open(&mut wm, 0x1, (0, 0));
    let b = open(&mut wm, 0x2, (0, 0));

    wm.decorations_mut().drag_tab(a, b, 0x1);
    let hints = atom(&wm, "WM_NORMAL_HINTS");
    wm.handle_event(WmEvent::PropertyNotify { window: a, atom: hints }).unwrap();

    assert_eq!(wm.layout().frame_of(0x1), Some(b));
    assert!(!wm.layout().frame_exists(a));
    assert!(!wm.decorations().has_frame(a));
    assert_eq!(wm.display().parent(0x1), Some(b));
    assert_eq!(wm.layout().frame(b).unwrap().history, vec![0x2, 0x1]);
    assert_eq!(wm.display().focused(), Some(0x1));
    assert!(wm.layout().validate().is_empty());
}

#[test]
fn test_tab_dropped_by_service_is_closed() {
    let mut wm = manager("tiled");
    let a = open(&mut wm, 0x1, (0, 0));
    open_tab(&mut wm, 0x2);

    wm.decorations_mut().drop_tab(a, 0x2);
    let hints = atom(&wm, "WM_NORMAL_HINTS");
    wm.handle_event(WmEvent::PropertyNotify { window: a, atom: hints }).unwrap();
    assert_eq!(wm.display().closed(), vec![0x2]);

    // The client goes away in response
    wm.handle_event(WmEvent::DestroyNotify { window: 0x2 }).unwrap();
    assert_eq!(wm.layout().frame(a).unwrap().history, vec![0x1]);
    assert!(wm.display().is_mapped(0x1));
}

#[test]
fn test_tab_count_message_closes_missing_tabs() {
    let mut wm = manager("tiled");
    let a = open(&mut wm, 0x1, (0, 0));
    open_tab(&mut wm, 0x2);
    wm.decorations_mut().drop_tab(a, 0x1);

    // Any other payload is ignored
    wm.handle_event(WmEvent::ClientMessage { window: a, data: [1, 0, 0, 0, 0] }).unwrap();
    assert!(wm.display().closed().is_empty());

    wm.handle_event(WmEvent::ClientMessage { window: a, data: [3, 0, 0, 0, 0] }).unwrap();
    assert_eq!(wm.display().closed(), vec![0x1]);
}

#[test]
fn test_tab_clicked_in_service_is_shown() {
    let mut wm = manager("tiled");
    let a = open(&mut wm, 0x1, (0, 0));
    open_tab(&mut wm, 0x2);
    assert!(!wm.display().is_mapped(0x1));

    wm.decorations_mut().click_tab(a, 0x1);
    let user_time = atom(&wm, "_NET_WM_USER_TIME");
    wm.handle_event(WmEvent::PropertyNotify { window: a, atom: user_time }).unwrap();

    assert_eq!(wm.layout().frame(a).unwrap().active(), Some(0x1));
    assert!(wm.display().is_mapped(0x1));
    assert!(!wm.display().is_mapped(0x2));
    assert_eq!(wm.display().focused(), Some(0x1));
}

#[test]
fn test_title_change_renames_tab() {
    let mut wm = manager("tiled");
    open(&mut wm, 0x1, (0, 0));
    wm.display().set_title(0x1, "vim README.md");
    let net_wm_name = atom(&wm, "_NET_WM_NAME");
    wm.handle_event(WmEvent::PropertyNotify { window: 0x1, atom: net_wm_name }).unwrap();
    assert_eq!(wm.decorations().title(0x1), Some("vim README.md"));
}

#[test]
fn test_event_loop_survives_stale_windows() {
    let mut display = FakeDisplay::new(1920, 1080);
    display.vanish(0x50);
    display.push_event(WmEvent::MapRequest { window: 0x50 });
    display.push_event(WmEvent::DestroyNotify { window: 0x99 });
    display.push_event(WmEvent::Other);
    display.push_event(WmEvent::KeyPress {
        keycode: FakeDisplay::keycode_of(0x71),
        state: modifiers::CONTROL | modifiers::SHIFT | modifiers::MOD1,
        time: 1000,
    });

    let mut wm = WindowManager::new(display, FakeDecorations::new(), &config("tiled")).unwrap();
    wm.run().unwrap();
    assert!(!wm.is_running());
    assert!(wm.pending_frames().is_empty());
}

#[test]
fn test_event_loop_stops_when_display_is_lost() {
    let mut wm = manager("tiled");
    let err = wm.run().unwrap_err();
    assert!(matches!(err.downcast_ref::<WmError>(), Some(WmError::ConnectionLost(_))));
}

#[test]
fn test_service_rejection_is_not_fatal() {
    let mut display = FakeDisplay::new(1920, 1080);
    display.add_window(0x1, "term", &["XTerm"], (0, 0));
    display.push_event(WmEvent::MapRequest { window: 0x1 });
    display.push_event(WmEvent::MapRequest { window: 0x1 });

    let mut decorations = FakeDecorations::new();
    decorations.fail_next(WmError::ServiceRejected("busy".into()));
    let mut wm = WindowManager::new(display, decorations, &config("tiled")).unwrap();

    // The first request is dropped, the second succeeds, then the queue runs dry
    assert!(wm.run().is_err());
    assert_eq!(wm.pending_frames().len(), 1);
}

#[test]
fn test_workspace_wrap_and_bounds() {
    let mut wm = manager("tiled");
    wm.execute_action(WmAction::WorkspacePrev).unwrap();
    assert_eq!(wm.layout().current_workspace(), 2);
    wm.execute_action(WmAction::WorkspaceNext).unwrap();
    assert_eq!(wm.layout().current_workspace(), 0);

    wm.execute_action(WmAction::Workspace(5)).unwrap();
    assert_eq!(wm.layout().current_workspace(), 0);
    wm.execute_action(WmAction::Workspace(1)).unwrap();
    assert_eq!(wm.layout().current_workspace(), 1);
}

#[test]
fn test_move_to_workspace_conserves_frames() {
    let mut wm = manager("tiled");
    let a = open(&mut wm, 0x1, (0, 0));
    let b = open(&mut wm, 0x2, (0, 0));

    wm.execute_action(WmAction::MoveToWorkspace(1)).unwrap();
    assert_eq!(wm.layout().workspaces().frame_count(), 2);
    assert_eq!(wm.layout().history(), &[a]);
    assert!(!wm.display().is_mapped(b));
    assert_eq!(wm.display().focused(), Some(0x1));
    assert_eq!(wm.layout().frame_geometry(a), Some(Rect::new(25, 25, 1870, 1030)));

    wm.execute_action(WmAction::Workspace(1)).unwrap();
    assert_eq!(wm.layout().history(), &[b]);
    assert!(wm.display().is_mapped(b));
    assert!(!wm.display().is_mapped(a));
    assert_eq!(wm.display().focused(), Some(0x2));
    assert!(wm.layout().validate().is_empty());
}

#[test]
fn test_pointer_drag_moves_in_steps() {
    let mut wm = manager("floating");
    let a = open(&mut wm, 0x1, (0, 0));

    wm.handle_event(WmEvent::ButtonPress {
        button: buttons::LEFT,
        state: modifiers::MOD1,
        root_x: 600,
        root_y: 300,
        child: a,
        time: 1,
    })
    .unwrap();
    assert!(wm.drag().is_some());

    for (i, x) in [610, 620].into_iter().enumerate() {
        wm.handle_event(WmEvent::Motion { root_x: x, root_y: 300, time: 2 + i as u32 }).unwrap();
    }
    assert_eq!(wm.layout().frame_geometry(a).unwrap().x, 560);
    assert!(!wm.decorations().overlay_visible());

    wm.handle_event(WmEvent::Motion { root_x: 630, root_y: 300, time: 4 }).unwrap();
    assert_eq!(wm.layout().frame_geometry(a).unwrap().x, 585);
    assert_eq!(wm.drag().unwrap().carry(), (5, 0));
    assert!(wm.decorations().overlay_visible());
    assert_eq!(wm.display().border(a), Some(3));
    assert_eq!(wm.display().border_color(a), Some(0xffffff));

    wm.handle_event(WmEvent::Motion { root_x: 640, root_y: 300, time: 5 }).unwrap();
    assert_eq!(wm.layout().frame_geometry(a).unwrap().x, 585);
    assert_eq!(wm.decorations().overlay_shown(), 1);

    // A release of another button does not end the drag
    wm.handle_event(WmEvent::ButtonRelease { button: buttons::RIGHT, time: 6 }).unwrap();
    assert!(wm.drag().is_some());

    wm.handle_event(WmEvent::ButtonRelease { button: buttons::LEFT, time: 7 }).unwrap();
    assert!(wm.drag().is_none());
    assert!(!wm.decorations().overlay_visible());
    assert_eq!(wm.display().border(a), Some(0));
    assert_eq!(wm.display().replays(), 7);
}

#[test]
fn test_drag_requires_modifier_and_focused_frame() {
    let mut wm = manager("floating");
    let a = open(&mut wm, 0x1, (0, 0));

    let press = |state, x| WmEvent::ButtonPress {
        button: buttons::LEFT,
        state,
        root_x: x,
        root_y: 300,
        child: a,
        time: 1,
    };
    wm.handle_event(press(0, 600)).unwrap();
    assert!(wm.drag().is_none());
    wm.handle_event(press(modifiers::MOD1, 100)).unwrap();
    assert!(wm.drag().is_none());
    wm.handle_event(press(modifiers::MOD1 | modifiers::MOD2, 600)).unwrap();
    assert!(wm.drag().is_some());
}

#[test]
fn test_dragging_into_another_frame_swaps_them() {
    let mut wm = manager("tiled");
    let a = open(&mut wm, 0x1, (0, 0));
    let b = open(&mut wm, 0x2, (0, 0));
    assert_eq!(wm.layout().frame_geometry(b).unwrap().x, 972);

    wm.handle_event(WmEvent::ButtonPress {
        button: buttons::LEFT,
        state: modifiers::MOD1,
        root_x: 1000,
        root_y: 100,
        child: b,
        time: 1,
    })
    .unwrap();
    wm.handle_event(WmEvent::EnterNotify { window: a, child: 0x1 }).unwrap();

    assert_eq!(wm.layout().frame_geometry(b).unwrap().x, 25);
    assert_eq!(wm.layout().frame_geometry(a).unwrap().x, 972);
}

#[test]
fn test_right_button_drag_resizes_from_grabbed_corner() {
    let mut wm = manager("floating");
    let a = open(&mut wm, 0x1, (0, 0));
    assert_eq!(wm.layout().frame_geometry(a), Some(Rect::new(560, 290, 800, 500)));

    // South-east quadrant of the frame
    wm.handle_event(WmEvent::ButtonPress {
        button: buttons::RIGHT,
        state: modifiers::MOD1,
        root_x: 1300,
        root_y: 700,
        child: a,
        time: 1,
    })
    .unwrap();
    assert!(wm.drag().is_some());

    wm.handle_event(WmEvent::Motion { root_x: 1330, root_y: 700, time: 2 }).unwrap();
    assert_eq!(wm.layout().frame_geometry(a), Some(Rect::new(560, 290, 825, 500)));
    assert!(wm.decorations().overlay_visible());
    assert_eq!(wm.display().border(a), Some(3));
    assert_eq!(wm.display().border_color(a), Some(0xffffff));

    wm.handle_event(WmEvent::Motion { root_x: 1360, root_y: 730, time: 3 }).unwrap();
    assert_eq!(wm.layout().frame_geometry(a), Some(Rect::new(560, 290, 850, 525)));
    assert_eq!(wm.display().geometry(a), Some(Rect::new(560, 290, 850, 525)));

    // Only the button that started the drag ends it
    wm.handle_event(WmEvent::ButtonRelease { button: buttons::LEFT, time: 4 }).unwrap();
    assert!(wm.drag().is_some());
    wm.handle_event(WmEvent::ButtonRelease { button: buttons::RIGHT, time: 5 }).unwrap();
    assert!(wm.drag().is_none());
    assert!(!wm.decorations().overlay_visible());
    assert_eq!(wm.display().border(a), Some(0));

    // North-west quadrant: the south-east corner stays put
    wm.handle_event(WmEvent::ButtonPress {
        button: buttons::RIGHT,
        state: modifiers::MOD1,
        root_x: 600,
        root_y: 320,
        child: a,
        time: 6,
    })
    .unwrap();
    wm.handle_event(WmEvent::Motion { root_x: 575, root_y: 320, time: 7 }).unwrap();
    assert_eq!(wm.layout().frame_geometry(a), Some(Rect::new(535, 290, 875, 525)));
    wm.handle_event(WmEvent::ButtonRelease { button: buttons::RIGHT, time: 8 }).unwrap();
    assert!(wm.drag().is_none());
}

#[test]
fn test_dragging_over_background_swaps_with_frame_under_pointer() {
    let mut wm = manager("tiled");
    let a = open(&mut wm, 0x1, (0, 0));
    let b = open(&mut wm, 0x2, (0, 0));
    let background = 0x7fff;

    wm.handle_event(WmEvent::ButtonPress {
        button: buttons::LEFT,
        state: modifiers::MOD1,
        root_x: 1000,
        root_y: 100,
        child: b,
        time: 1,
    })
    .unwrap();

    // Pointer inside the primary frame, but the crossing reports no child
    wm.display().set_pointer(100, 500);
    wm.handle_event(WmEvent::EnterNotify { window: background, child: 0 }).unwrap();
    assert_eq!(wm.layout().frame_geometry(b).unwrap().x, 25);
    assert_eq!(wm.layout().frame_geometry(a).unwrap().x, 972);

    wm.handle_event(WmEvent::ButtonRelease { button: buttons::LEFT, time: 2 }).unwrap();
    assert!(wm.drag().is_none());
    assert!(wm.layout().validate().is_empty());
}

#[test]
fn test_dragging_over_empty_background_changes_nothing() {
    let mut wm = manager("tiled");
    let a = open(&mut wm, 0x1, (0, 0));
    let b = open(&mut wm, 0x2, (0, 0));
    let background = 0x7fff;
    let before = (wm.layout().frame_geometry(a), wm.layout().frame_geometry(b));

    wm.handle_event(WmEvent::ButtonPress {
        button: buttons::LEFT,
        state: modifiers::MOD1,
        root_x: 1000,
        root_y: 100,
        child: b,
        time: 1,
    })
    .unwrap();

    // In the gap between the screen edge and every frame
    wm.display().set_pointer(5, 5);
    wm.handle_event(WmEvent::EnterNotify { window: background, child: 0 }).unwrap();
    assert_eq!((wm.layout().frame_geometry(a), wm.layout().frame_geometry(b)), before);

    wm.handle_event(WmEvent::ButtonRelease { button: buttons::LEFT, time: 2 }).unwrap();
    assert!(wm.drag().is_none());
    assert!(!wm.decorations().overlay_visible());
    assert_eq!((wm.layout().frame_geometry(a), wm.layout().frame_geometry(b)), before);
    assert_eq!(wm.layout().history().len(), 2);
}

#[test]
fn test_keyboard_frame_cycling() {
    let mut wm = manager("tiled");
    let a = open(&mut wm, 0x1, (0, 0));
    open(&mut wm, 0x2, (0, 0));
    assert_eq!(wm.display().focused(), Some(0x2));

    let tab = FakeDisplay::keycode_of(0xff09);
    wm.handle_event(WmEvent::KeyPress { keycode: tab, state: modifiers::MOD1, time: 1000 }).unwrap();
    assert_eq!(wm.layout().top_frame(), Some(a));
    assert_eq!(wm.display().focused(), Some(0x1));
    assert!(wm.display().raised().contains(&a));
    assert!(wm.decorations().is_focused(a));

    // Within the debounce window: ignored
    wm.handle_event(WmEvent::KeyPress { keycode: tab, state: modifiers::MOD1, time: 1050 }).unwrap();
    assert_eq!(wm.layout().top_frame(), Some(a));
}

#[test]
fn test_move_tab_to_next_frame() {
    let mut wm = manager("tiled");
    let a = open(&mut wm, 0x1, (0, 0));
    open_tab(&mut wm, 0x2);
    let b = open(&mut wm, 0x3, (0, 0));

    wm.execute_action(WmAction::NextFrame).unwrap();
    assert_eq!(wm.layout().top_frame(), Some(a));

    wm.execute_action(WmAction::MoveTabNextFrame).unwrap();
    assert_eq!(wm.layout().frame(a).unwrap().history, vec![0x1]);
    assert_eq!(wm.layout().frame(b).unwrap().history, vec![0x3, 0x2]);
    assert_eq!(wm.decorations().tabs(a), vec![0x1]);
    assert_eq!(wm.decorations().tabs(b), vec![0x3, 0x2]);
    assert_eq!(wm.display().parent(0x2), Some(b));
    assert_eq!(wm.display().focused(), Some(0x2));
    assert!(wm.layout().validate().is_empty());
}

#[test]
fn test_tab_cycling_and_close_focused() {
    let mut wm = manager("tiled");
    let a = open(&mut wm, 0x1, (0, 0));
    open_tab(&mut wm, 0x2);

    wm.execute_action(WmAction::NextTab).unwrap();
    assert_eq!(wm.layout().frame(a).unwrap().active(), Some(0x1));
    assert!(wm.display().is_mapped(0x1));

    wm.execute_action(WmAction::GotoTab(1)).unwrap();
    assert_eq!(wm.layout().frame(a).unwrap().active(), Some(0x2));

    wm.execute_action(WmAction::CloseWindow).unwrap();
    assert_eq!(wm.display().closed(), vec![0x2]);
    wm.execute_action(WmAction::CloseFrame).unwrap();
    assert_eq!(wm.display().closed(), vec![0x2, 0x1, 0x2]);
}

#[test]
fn test_layout_switch_applies_to_current_workspace() {
    let mut wm = manager("tiled");
    let a = open(&mut wm, 0x1, (0, 0));
    let b = open(&mut wm, 0x2, (0, 0));

    wm.execute_action(WmAction::SetLayout("fullscreen".parse().unwrap())).unwrap();
    assert_eq!(wm.layout().frame_geometry(a), Some(Rect::new(0, 0, 1920, 1080)));
    assert_eq!(wm.layout().frame_geometry(b), Some(Rect::new(0, 0, 1920, 1080)));

    wm.execute_action(WmAction::Workspace(1)).unwrap();
    assert_eq!(wm.layout().layout_kind().to_string(), "tiled");
}
