//! X11 implementation of [`DisplayServer`] over x11rb.
//!
//! Void requests are sent unchecked and flushed before blocking for the
//! next event; their errors come back through the event stream and are
//! logged. Requests with replies map a missing window to
//! [`WmError::StaleReference`].

use std::collections::HashMap;

use x11rb::connection::{Connection, RequestConnection};
use x11rb::errors::{ReplyError, ReplyOrIdError};
use x11rb::protocol::shape::{self, ConnectionExt as _};
use x11rb::protocol::xproto::*;
use x11rb::protocol::{ErrorKind, Event};
use x11rb::rust_connection::RustConnection;
use x11rb::{CURRENT_TIME, NONE};

use crate::display::{modifiers, ButtonGrab, DisplayServer, Subscription, WindowChanges};
use crate::error::WmError;
use crate::event::{ConfigureRequest, WmEvent};
use crate::types::{Rect, WindowId};

/// Atoms the backend itself needs
struct Atoms {
    wm_protocols: Atom,
    wm_delete_window: Atom,
    wm_window_role: Atom,
    net_wm_name: Atom,
    net_wm_visible_name: Atom,
    utf8_string: Atom,
}

impl Atoms {
    fn new(conn: &RustConnection) -> Result<Self, WmError> {
        Ok(Self {
            wm_protocols: intern(conn, "WM_PROTOCOLS")?,
            wm_delete_window: intern(conn, "WM_DELETE_WINDOW")?,
            wm_window_role: intern(conn, "WM_WINDOW_ROLE")?,
            net_wm_name: intern(conn, "_NET_WM_NAME")?,
            net_wm_visible_name: intern(conn, "_NET_WM_VISIBLE_NAME")?,
            utf8_string: intern(conn, "UTF8_STRING")?,
        })
    }
}

fn intern(conn: &RustConnection, name: &str) -> Result<Atom, WmError> {
    Ok(conn
        .intern_atom(false, name.as_bytes())?
        .reply()
        .map_err(|e| reply_error(0, e))?
        .atom)
}

/// Classify a failed reply: a vanished window is stale, a lost
/// connection is fatal
fn reply_error(window: Window, e: ReplyError) -> WmError {
    match e {
        ReplyError::ConnectionError(e) => e.into(),
        ReplyError::X11Error(err) => match err.error_kind {
            ErrorKind::Window | ErrorKind::Drawable => WmError::StaleReference(window),
            kind => WmError::MalformedReply(format!("X11 {:?} error for window 0x{:x}", kind, window)),
        },
    }
}

fn id_error(e: ReplyOrIdError) -> WmError {
    match e {
        ReplyOrIdError::ConnectionError(e) => e.into(),
        ReplyOrIdError::IdsExhausted => WmError::ConnectionLost("X11 resource ids exhausted".to_string()),
        ReplyOrIdError::X11Error(err) => WmError::MalformedReply(format!("X11 {:?} error", err.error_kind)),
    }
}

pub struct X11Display {
    conn: RustConnection,
    root: Window,
    screen: (u32, u32),
    atoms: Atoms,
    /// First keycode producing each keysym
    keycodes: HashMap<u32, Keycode>,
    shape_available: bool,
}

impl X11Display {
    /// Connect and take over the root window
    pub fn connect(display_name: Option<&str>) -> Result<Self, WmError> {
        let (conn, screen_num) = RustConnection::connect(display_name)
            .map_err(|e| WmError::ConnectionLost(format!("cannot connect to X11: {}", e)))?;

        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let size = (u32::from(screen.width_in_pixels), u32::from(screen.height_in_pixels));
        log::info!(
            "Connected to X11, screen {}, root window 0x{:x}, {}x{}",
            screen_num,
            root,
            size.0,
            size.1
        );

        let atoms = Atoms::new(&conn)?;
        let keycodes = Self::keyboard_map(&conn)?;
        let shape_available = conn
            .extension_information(shape::X11_EXTENSION_NAME)?
            .is_some();
        if !shape_available {
            log::warn!("SHAPE extension missing, corners will stay square");
        }

        let display = Self {
            conn,
            root,
            screen: size,
            atoms,
            keycodes,
            shape_available,
        };
        display.become_wm()?;
        Ok(display)
    }

    /// Select substructure redirect on the root; fails if another manager holds it
    fn become_wm(&self) -> Result<(), WmError> {
        let aux = ChangeWindowAttributesAux::new().event_mask(Self::event_mask(Subscription::Root));
        let cookie = self.conn.change_window_attributes(self.root, &aux)?;
        if let Err(e) = cookie.check() {
            return Err(WmError::ConnectionLost(format!(
                "another window manager is already running: {:?}",
                e
            )));
        }
        log::info!("Successfully became the window manager");
        Ok(())
    }

    fn keyboard_map(conn: &RustConnection) -> Result<HashMap<u32, Keycode>, WmError> {
        let setup = conn.setup();
        let min_keycode = setup.min_keycode;
        let count = setup.max_keycode - min_keycode + 1;
        let mapping = conn
            .get_keyboard_mapping(min_keycode, count)?
            .reply()
            .map_err(|e| reply_error(0, e))?;

        let per_keycode = usize::from(mapping.keysyms_per_keycode.max(1));
        let mut keycodes = HashMap::new();
        for (i, chunk) in mapping.keysyms.chunks(per_keycode).enumerate() {
            for &keysym in chunk.iter().filter(|&&s| s != 0) {
                keycodes.entry(keysym).or_insert(min_keycode + i as u8);
            }
        }
        Ok(keycodes)
    }

    fn event_mask(subscription: Subscription) -> EventMask {
        match subscription {
            Subscription::Root => EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
            Subscription::Frame => {
                EventMask::SUBSTRUCTURE_NOTIFY | EventMask::PROPERTY_CHANGE | EventMask::ENTER_WINDOW
            }
            Subscription::Client => EventMask::PROPERTY_CHANGE | EventMask::STRUCTURE_NOTIFY,
        }
    }

    fn translate(&self, event: Event) -> WmEvent {
        match event {
            Event::MapRequest(e) => WmEvent::MapRequest { window: e.window },
            Event::DestroyNotify(e) => WmEvent::DestroyNotify { window: e.window },
            Event::ConfigureRequest(e) => WmEvent::ConfigureRequest(ConfigureRequest {
                window: e.window,
                x: i32::from(e.x),
                y: i32::from(e.y),
                width: u32::from(e.width),
                height: u32::from(e.height),
            }),
            Event::KeyPress(e) => WmEvent::KeyPress {
                keycode: e.detail,
                state: u16::from(e.state),
                time: e.time,
            },
            Event::ButtonPress(e) => WmEvent::ButtonPress {
                button: e.detail,
                state: u16::from(e.state),
                root_x: i32::from(e.root_x),
                root_y: i32::from(e.root_y),
                child: e.child,
                time: e.time,
            },
            Event::MotionNotify(e) => WmEvent::Motion {
                root_x: i32::from(e.root_x),
                root_y: i32::from(e.root_y),
                time: e.time,
            },
            Event::ButtonRelease(e) => WmEvent::ButtonRelease {
                button: e.detail,
                time: e.time,
            },
            Event::PropertyNotify(e) => WmEvent::PropertyNotify {
                window: e.window,
                atom: e.atom,
            },
            Event::ClientMessage(e) => WmEvent::ClientMessage {
                window: e.window,
                data: e.data.as_data32(),
            },
            Event::EnterNotify(e) => WmEvent::EnterNotify {
                window: e.event,
                child: e.child,
            },
            Event::Error(e) => {
                log::debug!("X11 error {:?} (request {})", e.error_kind, e.major_opcode);
                WmEvent::Other
            }
            _ => WmEvent::Other,
        }
    }

    /// Read a text property; empty when unset
    fn text_property(&self, window: Window, property: Atom, type_: Atom) -> Result<String, WmError> {
        let reply = self
            .conn
            .get_property(false, window, property, type_, 0, 1024)?
            .reply()
            .map_err(|e| reply_error(window, e))?;
        Ok(String::from_utf8_lossy(&reply.value).into_owned())
    }

    fn supports_delete_protocol(&self, window: Window) -> Result<bool, WmError> {
        let reply = self
            .conn
            .get_property(false, window, self.atoms.wm_protocols, AtomEnum::ATOM, 0, 32)?
            .reply()
            .map_err(|e| reply_error(window, e))?;
        Ok(reply
            .value32()
            .is_some_and(|mut atoms| atoms.any(|a| a == self.atoms.wm_delete_window)))
    }

    fn send_delete_window(&self, window: Window) -> Result<(), WmError> {
        let data = ClientMessageData::from([self.atoms.wm_delete_window, CURRENT_TIME, 0, 0, 0]);
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window,
            type_: self.atoms.wm_protocols,
            data,
        };
        self.conn.send_event(false, window, EventMask::NO_EVENT, event)?;
        self.conn.flush()?;
        Ok(())
    }

    /// Rectangles and arcs covering a rounded-corner shape of `w`×`h`
    fn rounded_shape(w: u16, h: u16, top: u16, bottom: u16) -> (Vec<Rectangle>, Vec<Arc>) {
        let top = top.min(w / 2).min(h / 2);
        let bottom = bottom.min(w / 2).min(h / 2);
        let full = 360 * 64;

        let rects = vec![
            Rectangle { x: 0, y: top as i16, width: w, height: h.saturating_sub(top + bottom) },
            Rectangle { x: top as i16, y: 0, width: w - 2 * top, height: top },
            Rectangle {
                x: bottom as i16,
                y: (h - bottom) as i16,
                width: w - 2 * bottom,
                height: bottom,
            },
        ];
        let mut arcs = Vec::new();
        if top > 0 {
            let d = 2 * top;
            arcs.push(Arc { x: 0, y: 0, width: d, height: d, angle1: 0, angle2: full });
            arcs.push(Arc { x: (w - d) as i16, y: 0, width: d, height: d, angle1: 0, angle2: full });
        }
        if bottom > 0 {
            let d = 2 * bottom;
            arcs.push(Arc { x: 0, y: (h - d) as i16, width: d, height: d, angle1: 0, angle2: full });
            arcs.push(Arc {
                x: (w - d) as i16,
                y: (h - d) as i16,
                width: d,
                height: d,
                angle1: 0,
                angle2: full,
            });
        }
        (rects, arcs)
    }
}

impl DisplayServer for X11Display {
    fn screen_size(&self) -> (u32, u32) {
        self.screen
    }

    fn next_event(&mut self) -> Result<WmEvent, WmError> {
        self.conn.flush()?;
        let event = self.conn.wait_for_event()?;
        Ok(self.translate(event))
    }

    fn intern_atom(&self, name: &str) -> Result<u32, WmError> {
        intern(&self.conn, name)
    }

    fn map_window(&self, window: WindowId) -> Result<(), WmError> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap_window(&self, window: WindowId) -> Result<(), WmError> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn unmap_children(&self, window: WindowId) -> Result<(), WmError> {
        let tree = self
            .conn
            .query_tree(window)?
            .reply()
            .map_err(|e| reply_error(window, e))?;
        for child in tree.children {
            self.conn.unmap_window(child)?;
        }
        Ok(())
    }

    fn reparent(&self, window: WindowId, parent: WindowId) -> Result<(), WmError> {
        self.conn.reparent_window(window, parent, 0, 0)?;
        Ok(())
    }

    fn configure(&self, window: WindowId, changes: &WindowChanges) -> Result<(), WmError> {
        let mut aux = ConfigureWindowAux::new()
            .x(changes.x)
            .y(changes.y)
            .width(changes.width)
            .height(changes.height)
            .border_width(changes.border_width);
        if changes.raise {
            aux = aux.stack_mode(StackMode::ABOVE);
        }
        self.conn.configure_window(window, &aux)?;
        Ok(())
    }

    fn get_size(&self, window: WindowId) -> Result<(u32, u32), WmError> {
        let rect = self.get_geometry(window)?;
        Ok((rect.width, rect.height))
    }

    fn get_geometry(&self, window: WindowId) -> Result<Rect, WmError> {
        let geometry = self
            .conn
            .get_geometry(window)?
            .reply()
            .map_err(|e| reply_error(window, e))?;
        Ok(Rect::new(
            i32::from(geometry.x),
            i32::from(geometry.y),
            u32::from(geometry.width),
            u32::from(geometry.height),
        ))
    }

    fn close_window(&self, window: WindowId) -> Result<(), WmError> {
        if self.supports_delete_protocol(window)? {
            log::debug!("Sending WM_DELETE_WINDOW to 0x{:x}", window);
            self.send_delete_window(window)
        } else {
            log::debug!("Killing client 0x{:x}", window);
            self.conn.kill_client(window)?;
            Ok(())
        }
    }

    fn set_event_subscription(&self, window: WindowId, subscription: Subscription) -> Result<(), WmError> {
        let aux = ChangeWindowAttributesAux::new().event_mask(Self::event_mask(subscription));
        self.conn.change_window_attributes(window, &aux)?;
        Ok(())
    }

    fn grab_key(&self, keycode: u8, mods: u16) -> Result<(), WmError> {
        // Grab with and without CapsLock/NumLock so bindings work in every state
        for extra in [0, modifiers::LOCK, modifiers::MOD2, modifiers::LOCK | modifiers::MOD2] {
            self.conn.grab_key(
                false,
                self.root,
                ModMask::from(mods | extra),
                keycode,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            )?;
        }
        Ok(())
    }

    fn grab_button(&self, button: u8, mods: u16, grab: ButtonGrab) -> Result<(), WmError> {
        let event_mask = match grab {
            ButtonGrab::Press => EventMask::BUTTON_PRESS,
            ButtonGrab::ReleaseAndMotion => EventMask::BUTTON_RELEASE | EventMask::BUTTON_MOTION,
        };
        self.conn.grab_button(
            true,
            self.root,
            event_mask,
            GrabMode::SYNC,
            GrabMode::ASYNC,
            NONE,
            NONE,
            ButtonIndex::from(button),
            ModMask::from(mods),
        )?;
        Ok(())
    }

    fn keycode_for_keysym(&self, keysym: u32) -> Option<u8> {
        self.keycodes.get(&keysym).copied()
    }

    fn window_title(&self, window: WindowId) -> Result<String, WmError> {
        let utf8 = self.atoms.utf8_string;
        for (property, type_) in [
            (self.atoms.net_wm_visible_name, utf8),
            (self.atoms.net_wm_name, utf8),
            (Atom::from(AtomEnum::WM_NAME), Atom::from(AtomEnum::STRING)),
        ] {
            let title = self.text_property(window, property, type_)?;
            if !title.is_empty() {
                return Ok(title);
            }
        }
        Ok(format!("0x{:x}", window))
    }

    fn window_classes(&self, window: WindowId) -> Result<Vec<String>, WmError> {
        let raw = self.text_property(window, AtomEnum::WM_CLASS.into(), AtomEnum::STRING.into())?;
        Ok(raw
            .split('\0')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn window_role(&self, window: WindowId) -> Result<Option<String>, WmError> {
        let role = self.text_property(window, self.atoms.wm_window_role, AtomEnum::ANY.into())?;
        Ok((!role.is_empty()).then_some(role))
    }

    fn set_input_focus(&self, window: WindowId) -> Result<(), WmError> {
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, window, CURRENT_TIME)?;
        Ok(())
    }

    fn set_border_color(&self, window: WindowId, rgb: u32) -> Result<(), WmError> {
        let aux = ChangeWindowAttributesAux::new().border_pixel(rgb);
        self.conn.change_window_attributes(window, &aux)?;
        Ok(())
    }

    fn apply_rounded_mask(&self, window: WindowId, top_radius: u32, bottom_radius: u32) -> Result<(), WmError> {
        if !self.shape_available {
            return Ok(());
        }
        if top_radius == 0 && bottom_radius == 0 {
            self.conn
                .shape_mask(shape::SO::SET, shape::SK::BOUNDING, window, 0, 0, NONE)?;
            return Ok(());
        }

        let rect = self.get_geometry(window)?;
        let (w, h) = (rect.width.min(u16::MAX as u32) as u16, rect.height.min(u16::MAX as u32) as u16);
        if w == 0 || h == 0 {
            return Ok(());
        }
        let clamp = |r: u32| r.min(u16::MAX as u32) as u16;
        let (rects, arcs) = Self::rounded_shape(w, h, clamp(top_radius), clamp(bottom_radius));

        let pixmap = self.conn.generate_id().map_err(id_error)?;
        let gc = self.conn.generate_id().map_err(id_error)?;
        self.conn.create_pixmap(1, pixmap, window, w, h)?;
        self.conn
            .create_gc(gc, pixmap, &CreateGCAux::new().foreground(0))?;
        self.conn.poly_fill_rectangle(
            pixmap,
            gc,
            &[Rectangle { x: 0, y: 0, width: w, height: h }],
        )?;
        self.conn
            .change_gc(gc, &ChangeGCAux::new().foreground(1))?;
        self.conn.poly_fill_rectangle(pixmap, gc, &rects)?;
        self.conn.poly_fill_arc(pixmap, gc, &arcs)?;
        self.conn
            .shape_mask(shape::SO::SET, shape::SK::BOUNDING, window, 0, 0, pixmap)?;
        self.conn.free_gc(gc)?;
        self.conn.free_pixmap(pixmap)?;
        Ok(())
    }

    fn query_pointer(&self) -> Result<(i32, i32), WmError> {
        let reply = self
            .conn
            .query_pointer(self.root)?
            .reply()
            .map_err(|e| reply_error(self.root, e))?;
        Ok((i32::from(reply.root_x), i32::from(reply.root_y)))
    }

    fn replay_pointer(&self, time: u32) -> Result<(), WmError> {
        self.conn.allow_events(Allow::REPLAY_POINTER, time)?;
        self.conn.flush()?;
        Ok(())
    }
}
