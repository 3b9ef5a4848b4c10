//! Display-name suggestion for new sessions.
//!
//! Every session gets a readable "Color Animal" placeholder name before
//! the client has a chance to pick its own.

use rand::Rng;

const COLORS: &[&str] = &[
    "Amber", "Azure", "Beige", "Bronze", "Cobalt", "Copper", "Coral",
    "Crimson", "Emerald", "Golden", "Indigo", "Ivory", "Jade", "Lavender",
    "Magenta", "Maroon", "Olive", "Pearl", "Ruby", "Russet", "Saffron",
    "Scarlet", "Silver", "Teal", "Violet",
];

const ANIMALS: &[&str] = &[
    "Badger", "Bison", "Condor", "Coyote", "Crane", "Dolphin", "Falcon",
    "Ferret", "Fox", "Gecko", "Heron", "Ibex", "Jackal", "Lemur", "Lynx",
    "Marmot", "Otter", "Panther", "Pelican", "Puffin", "Raven", "Stoat",
    "Swift", "Walrus", "Wombat",
];

/// Generate a suggested display name, e.g. "Crimson Otter".
pub fn suggest_client_name() -> String {
    let mut rng = rand::rng();
    let color = COLORS[rng.random_range(0..COLORS.len())];
    let animal = ANIMALS[rng.random_range(0..ANIMALS.len())];
    format!("{color} {animal}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
