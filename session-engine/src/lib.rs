// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

pub mod assignment;
pub mod engine;
pub mod error;
pub mod phase;
pub mod registry;
pub mod role_pool;
pub mod state;
pub mod store;
pub mod sync;
pub mod view;
pub mod win;

pub use engine::{CheckResult, CommandOutcome, EngineConfig, GameEngine};
pub use error::EngineError;
pub use registry::LiveGameRegistry;
pub use store::{InMemorySessionStore, SessionStore};
pub use view::{HostAction, LiveGameView, PlayerView};
pub use win::WinRule;
