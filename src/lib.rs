//! mixdeck: a terminal front end for discovering and playing long-form
//! DJ sets through two embeddable media players.
//!
//! The playback core is the interesting part: a state store that unifies
//! an mpv-backed video embed and a VLC-backed audio widget behind one
//! play/queue/progress abstraction, with a fallback clock so the transport
//! never freezes while a vendor is (or stays) unavailable.

pub mod controller;
pub mod logging;
pub mod model;
pub mod player;
pub mod view;
