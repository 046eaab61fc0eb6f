//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Itinerary instructions and target shape
pub const ITINERARY: &str = include_str!("../../prompts/itinerary.pmt");

/// Visual board instructions and target shape
pub const BOARD: &str = include_str!("../../prompts/board.pmt");

/// Web-search preamble wrapped around the itinerary prompt for link input
pub const LINK_ITINERARY: &str = include_str!("../../prompts/link-itinerary.pmt");

/// Web-search preamble wrapped around the board prompt for link input
pub const LINK_BOARD: &str = include_str!("../../prompts/link-board.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "itinerary" => Some(ITINERARY),
        "board" => Some(BOARD),
        "link-itinerary" => Some(LINK_ITINERARY),
        "link-board" => Some(LINK_BOARD),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
