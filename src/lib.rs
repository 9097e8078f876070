// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! A gamepad-driven generative melody player. Buttons pick a bucket and a
//! scale, an oracle turns that into a note, and the trigger controls how long
//! released notes ring.

pub mod audio;
pub mod config;
pub mod console;
pub mod controller;
pub mod generator;
pub mod input;
pub mod scale;
pub mod session;
pub mod voice;
