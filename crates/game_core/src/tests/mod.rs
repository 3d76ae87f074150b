//! Cross-module tests that drive the engine with real Lua scripts

mod scripted_frame;
