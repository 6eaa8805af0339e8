//! Device info field names and the menu/game screen classification.

use std::fmt;

use sni_proto::sni::Field;

/// FX Pak Pro menus boot `menu.bin` or `m3nu.bin`; games end in `.sfc`/`.smc`.
const MENU_SUFFIX: &str = ".bin";

/// Keeps the names the protocol's `Field` enum knows, in input order.
pub fn encode_field_names<S: AsRef<str>>(names: &[S]) -> Vec<Field> {
    names
        .iter()
        .filter_map(|name| Field::from_str_name(name.as_ref()))
        .collect()
}

pub fn field_names() -> impl Iterator<Item = &'static str> {
    [
        Field::DeviceName,
        Field::DeviceVersion,
        Field::DeviceStatus,
        Field::CoreName,
        Field::CoreVersion,
        Field::CorePlatform,
        Field::RomFileName,
        Field::RomHashType,
        Field::RomHashValue,
    ]
    .into_iter()
    .map(|field| field.as_str_name())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Game,
}

impl Screen {
    pub fn classify(rom_file_name: &str) -> Self {
        if rom_file_name.trim().to_ascii_lowercase().ends_with(MENU_SUFFIX) {
            Screen::Menu
        } else {
            Screen::Game
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Screen::Menu => "menu",
            Screen::Game => "game",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
