//! In-memory listing document
//!
//! Stands in for the engine's document model: an address-ordered list of
//! listing items. Mutations publish [`ViewEvent::DocumentChanged`] on the
//! event bus so views know to invalidate.

use disview_render::{format_address, is_valid_hex_address, parse_hex_address, CursorPosition, EventBus, LineMetrics, ViewEvent};
use std::ops::RangeInclusive;

/// Kind of a listing item, used for colouring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Segment,
    Function,
    Code,
    Data,
    Text,
    Unexplored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    pub address: u64,
    pub kind: ItemKind,
    pub text: String,
}

/// Listing shown by the text view and the listing map
pub struct ListingDocument {
    items: Vec<ListingItem>,
    bus: EventBus,
}

const MNEMONICS: [&str; 8] = [
    "mov eax, [ebp-0x8]",
    "add eax, ecx",
    "cmp eax, 0x10",
    "jne",
    "lea ecx, [esi+0x4]",
    "xor edx, edx",
    "call",
    "test eax, eax",
];

/// Prefix of function names that embed the function's address
const FUNCTION_PREFIX: &str = "sub_";

impl ListingDocument {
    pub fn new(items: Vec<ListingItem>, bus: EventBus) -> Self {
        Self { items, bus }
    }

    /// Sample listing of roughly `count` items starting at `base`.
    ///
    /// Functions alternate with data blocks; the tail half is left
    /// unexplored so [`ListingDocument::explore_next`] has work to do.
    pub fn sample(count: usize, base: u64, bus: EventBus) -> Self {
        let mut items = Vec::with_capacity(count);
        let mut address = base;
        if count == 0 {
            return Self::new(items, bus);
        }

        items.push(ListingItem {
            address,
            kind: ItemKind::Segment,
            text: "segment .text".to_string(),
        });

        let explored = count / 2;
        let mut function = 0;
        let mut starts = Vec::new();
        while items.len() < explored {
            let start = address;
            starts.push(start);
            items.push(ListingItem {
                address,
                kind: ItemKind::Function,
                text: format!("function sub_{}", format_address(address, 8)),
            });
            items.push(ListingItem {
                address,
                kind: ItemKind::Code,
                text: "push ebp".to_string(),
            });
            address += 1;

            for i in 0..(8 + function % 13) {
                let text = match MNEMONICS[(i + function) % MNEMONICS.len()] {
                    "jne" => format!("jne 0x{}", format_address(start, 8)),
                    "call" => format!("call 0x{}", format_address(starts[function / 2], 8)),
                    mnemonic => mnemonic.to_string(),
                };
                items.push(ListingItem {
                    address,
                    kind: ItemKind::Code,
                    text,
                });
                address += 3;
            }
            items.push(ListingItem {
                address,
                kind: ItemKind::Code,
                text: "ret".to_string(),
            });
            address += 1;

            if function % 3 == 2 {
                items.push(ListingItem {
                    address,
                    kind: ItemKind::Text,
                    text: format!("\"string_{}\"", function),
                });
                address += 16;
                for _ in 0..4 {
                    items.push(ListingItem {
                        address,
                        kind: ItemKind::Data,
                        text: "dd 0x00000000".to_string(),
                    });
                    address += 4;
                }
            }
            function += 1;
        }

        while items.len() < count {
            items.push(ListingItem {
                address,
                kind: ItemKind::Unexplored,
                text: "db ??".to_string(),
            });
            address += 1;
        }

        Self::new(items, bus)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, line: usize) -> Option<&ListingItem> {
        self.items.get(line)
    }

    pub fn kinds(&self) -> Vec<ItemKind> {
        self.items.iter().map(|item| item.kind).collect()
    }

    /// Text of `line` without the address column
    pub fn line_text(&self, line: usize) -> &str {
        self.items.get(line).map_or("", |item| item.text.as_str())
    }

    /// Text between two positions, one listing line per output line
    pub fn selection_text(&self, start: CursorPosition, end: CursorPosition) -> String {
        let mut lines = Vec::new();
        for line in start.line..=end.line.min(self.len().saturating_sub(1)) {
            let text = self.line_text(line);
            let from = if line == start.line { start.column } else { 0 };
            let to = if line == end.line { end.column } else { usize::MAX };
            lines.push(text.chars().skip(from).take(to.saturating_sub(from)).collect::<String>());
        }
        lines.join("\n")
    }

    /// Address named by the operand under `position`.
    ///
    /// Only `0x` prefixed numbers and `sub_` function names count, so
    /// mnemonics that happen to be hex digits (`add`, `dd`) are skipped.
    pub fn operand_address(&self, position: CursorPosition) -> Option<u64> {
        let word = word_at(self.line_text(position.line), position.column)?;
        let digits = match word.strip_prefix(FUNCTION_PREFIX) {
            Some(digits) => digits,
            None if word.starts_with("0x") || word.starts_with("0X") => word,
            None => return None,
        };
        if !is_valid_hex_address(digits) {
            return None;
        }
        parse_hex_address(digits).ok()
    }

    /// Line of the first item that starts exactly at `address`
    pub fn line_of_address(&self, address: u64) -> Option<usize> {
        self.find_address(address)
            .filter(|line| self.items[*line].address == address)
    }

    /// First line at or after `address`
    pub fn find_address(&self, address: u64) -> Option<usize> {
        let line = self.items.partition_point(|item| item.address < address);
        (line < self.items.len()).then_some(line)
    }

    /// Turn the next run of unexplored bytes (at most `batch`) into data.
    ///
    /// Returns the changed lines, or `None` when nothing is left.
    pub fn explore_next(&mut self, batch: usize) -> Option<RangeInclusive<usize>> {
        let first = self.items.iter().position(|item| item.kind == ItemKind::Unexplored)?;
        let mut last = first;

        for (line, item) in self.items.iter_mut().enumerate().skip(first).take(batch.max(1)) {
            if item.kind != ItemKind::Unexplored {
                break;
            }
            item.kind = ItemKind::Data;
            item.text = format!("db 0x{:02X}", item.address & 0xff);
            last = line;
        }

        log::debug!("Explored lines {}..={}", first, last);
        self.bus.publish(&ViewEvent::DocumentChanged {
            first,
            last,
            line_count: self.items.len(),
        });
        Some(first..=last)
    }
}

/// Identifier-like word covering `column`, if any
fn word_at(text: &str, column: usize) -> Option<&str> {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let (_, under) = *chars.get(column)?;
    if !is_word(under) {
        return None;
    }

    let start = chars[..column]
        .iter()
        .rev()
        .take_while(|(_, c)| is_word(*c))
        .last()
        .map_or(chars[column].0, |(index, _)| *index);
    let end = chars[column..]
        .iter()
        .find(|(_, c)| !is_word(*c))
        .map_or(text.len(), |(index, _)| *index);
    Some(&text[start..end])
}

impl LineMetrics for ListingDocument {
    fn line_count(&self) -> usize {
        self.items.len()
    }

    fn line_length(&self, line: usize) -> usize {
        self.line_text(line).chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use disview_render::Topic;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_sample_is_address_ordered() {
        let document = ListingDocument::sample(500, 0x401000, EventBus::new());

        assert_eq!(document.len(), 500);
        assert_eq!(document.item(0).unwrap().kind, ItemKind::Segment);
        assert!(document
            .kinds()
            .iter()
            .any(|kind| *kind == ItemKind::Unexplored));

        let addresses: Vec<u64> = (0..document.len()).map(|i| document.item(i).unwrap().address).collect();
        assert!(addresses.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_find_address() {
        let document = ListingDocument::sample(200, 0x1000, EventBus::new());

        assert_eq!(document.find_address(0), Some(0));

        let line = document.find_address(0x1001).unwrap();
        assert!(document.item(line).unwrap().address >= 0x1001);
        assert!(document.item(line - 1).unwrap().address < 0x1001);
        assert_eq!(document.find_address(u64::MAX), None);
    }

    #[test]
    fn test_empty_sample() {
        let document = ListingDocument::sample(0, 0x1000, EventBus::new());
        assert!(document.is_empty());
    }

    #[test]
    fn test_selection_text_spans_lines() {
        let document = ListingDocument::new(
            vec![
                ListingItem {
                    address: 0x10,
                    kind: ItemKind::Code,
                    text: "push ebp".to_string(),
                },
                ListingItem {
                    address: 0x11,
                    kind: ItemKind::Code,
                    text: "mov ebp, esp".to_string(),
                },
            ],
            EventBus::new(),
        );

        let text = document.selection_text(CursorPosition::new(0, 5), CursorPosition::new(1, 3));
        assert_eq!(text, "ebp\nmov");
        assert_eq!(
            document.selection_text(CursorPosition::new(1, 4), CursorPosition::new(1, 7)),
            "ebp"
        );
    }

    #[test]
    fn test_operand_address() {
        let document = ListingDocument::new(
            vec![
                ListingItem {
                    address: 0x401000,
                    kind: ItemKind::Code,
                    text: "call 0x00401200".to_string(),
                },
                ListingItem {
                    address: 0x401005,
                    kind: ItemKind::Function,
                    text: "function sub_00401005".to_string(),
                },
                ListingItem {
                    address: 0x401006,
                    kind: ItemKind::Code,
                    text: "add eax, ecx".to_string(),
                },
            ],
            EventBus::new(),
        );

        assert_eq!(document.operand_address(CursorPosition::new(0, 8)), Some(0x401200));
        assert_eq!(document.operand_address(CursorPosition::new(0, 2)), None);
        assert_eq!(document.operand_address(CursorPosition::new(1, 12)), Some(0x401005));
        assert_eq!(document.operand_address(CursorPosition::new(2, 1)), None);
        assert_eq!(document.operand_address(CursorPosition::new(2, 3)), None);
        assert_eq!(document.operand_address(CursorPosition::new(9, 0)), None);

        assert_eq!(document.line_of_address(0x401005), Some(1));
        assert_eq!(document.line_of_address(0x401004), None);
    }

    #[test]
    fn test_sample_call_targets_are_functions() {
        let document = ListingDocument::sample(400, 0x401000, EventBus::new());
        let call = (0..document.len())
            .find(|line| document.line_text(*line).starts_with("call "))
            .unwrap();

        let target = document.operand_address(CursorPosition::new(call, 6)).unwrap();
        let line = document.line_of_address(target).unwrap();
        assert!(matches!(document.item(line).unwrap().kind, ItemKind::Segment | ItemKind::Function));
    }

    #[test]
    fn test_explore_next_publishes_change() {
        let bus = EventBus::new();
        let changes = Arc::new(AtomicUsize::new(0));
        let counter = changes.clone();
        bus.subscribe(Topic::DocumentChanged, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut document = ListingDocument::sample(100, 0x1000, bus);
        let range = document.explore_next(10).unwrap();

        assert_eq!(range.end() - range.start(), 9);
        assert!(range.clone().all(|line| document.item(line).unwrap().kind == ItemKind::Data));
        assert_eq!(changes.load(Ordering::SeqCst), 1);

        while document.explore_next(64).is_some() {}
        assert!(document.kinds().iter().all(|kind| *kind != ItemKind::Unexplored));
    }
}
