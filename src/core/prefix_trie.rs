use crate::core::address_family::{canonical, canonical_network, AddressFamily};
use crate::core::errors::{Error, Result};
use ipnetwork::IpNetwork;
use std::net::IpAddr;

/*-------------------------------------------------------------------------------------------------
  Prefix Trie
-------------------------------------------------------------------------------------------------*/

/// Binary trie over the address bits of one [AddressFamily].
///
/// Each inserted CIDR block marks the node at depth `prefix_length` (walking from the most
/// significant bit) as terminal. A membership query walks the address's own bit path and
/// succeeds at the first terminal node it meets, so a lookup costs at most `family.bits()`
/// steps regardless of how many blocks are stored.
///
/// Nested blocks are resolved first-prefix-wins: a block inserted below an existing terminal
/// is a no-op ([InsertOutcome::Covered]), and a shorter block inserted above existing ones
/// replaces the subtree it dominates. No terminal ever has terminals below it.
#[derive(Debug, Clone)]
pub struct PrefixTrie {
    family: AddressFamily,
    root: Node,
    len: usize,
}

#[derive(Debug, Clone, Default)]
struct Node {
    children: [Option<Box<Node>>; 2],
    cidr: Option<Box<str>>,
}

impl Node {
    fn is_terminal(&self) -> bool {
        self.cidr.is_some()
    }
}

/// Result of [PrefixTrie::insert].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InsertOutcome {
    /// The block was stored.
    Inserted,
    /// An identical block was already stored.
    Duplicate,
    /// A shorter block already covers this one; nothing was stored.
    Covered,
    /// The text is not a valid CIDR block.
    Invalid,
    /// The block belongs to the other address family.
    WrongFamily,
}

/*--------------------------------------------------------------------------------------
  Prefix Trie Implementation
--------------------------------------------------------------------------------------*/

impl PrefixTrie {
    pub fn new(family: AddressFamily) -> Self {
        Self {
            family,
            root: Node::default(),
            len: 0,
        }
    }

    /*-------------------------------------------------------------------------
      Getters
    -------------------------------------------------------------------------*/

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Number of terminal blocks currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /*-------------------------------------------------------------------------
      Insert
    -------------------------------------------------------------------------*/

    /// Insert a CIDR block given in text form (for example `10.0.0.0/8`).
    ///
    /// Parse failures never raise an error here; they are reported through the returned
    /// [InsertOutcome] so the caller can count and log them.
    pub fn insert(&mut self, cidr: &str) -> InsertOutcome {
        let Some(network) = parse_cidr(cidr) else {
            return InsertOutcome::Invalid;
        };
        if family_of_network(&network) != self.family {
            return InsertOutcome::WrongFamily;
        }

        let family = self.family;
        let bits = address_bits(&network.ip());

        let mut node = &mut self.root;
        for depth in 0..network.prefix() {
            if node.is_terminal() {
                return InsertOutcome::Covered;
            }
            let child = node.children[bit_at(bits, family, depth)].get_or_insert_with(Box::default);
            node = &mut **child;
        }

        if node.is_terminal() {
            return InsertOutcome::Duplicate;
        }

        // Terminals below this node are dominated by the new block.
        let dominated = count_terminals(node);
        node.children = [None, None];
        node.cidr = Some(cidr.trim().into());
        self.len = self.len + 1 - dominated;

        InsertOutcome::Inserted
    }

    /*-------------------------------------------------------------------------
      Contains
    -------------------------------------------------------------------------*/

    /// Parse `address` and test whether it falls inside any stored block.
    ///
    /// Returns [Error::InvalidAddress] for unparseable input. Addresses of the other family
    /// are never cross-matched and yield `Ok(false)`.
    pub fn contains(&self, address: &str) -> Result<bool> {
        let address: IpAddr = address
            .trim()
            .parse()
            .map_err(|_| Error::InvalidAddress(address.to_string()))?;
        Ok(self.contains_addr(&address))
    }

    /// Test whether `address` falls inside any stored block.
    pub fn contains_addr(&self, address: &IpAddr) -> bool {
        self.matching_prefix(address).is_some()
    }

    /// Text of the stored block containing `address`, if any.
    pub fn matching_prefix(&self, address: &IpAddr) -> Option<&str> {
        let address = canonical(address);
        if AddressFamily::of(&address) != self.family {
            return None;
        }

        let bits = address_bits(&address);
        let mut node = &self.root;
        for depth in 0..self.family.bits() {
            if let Some(cidr) = &node.cidr {
                return Some(cidr);
            }
            node = node.children[bit_at(bits, self.family, depth)].as_deref()?;
        }

        node.cidr.as_deref()
    }
}

/*-------------------------------------------------------------------------------------------------
  Helper Functions
-------------------------------------------------------------------------------------------------*/

/// Parse CIDR text; a bare address without `/length` is not a CIDR block. IPv4-mapped IPv6
/// blocks come back in their IPv4 form.
fn parse_cidr(cidr: &str) -> Option<IpNetwork> {
    let cidr = cidr.trim();
    if !cidr.contains('/') {
        return None;
    }
    cidr.parse().ok().map(|network| canonical_network(&network))
}

/// Family of the trie a block is stored in; mapped blocks route to IPv4, like mapped addresses.
pub(crate) fn family_of_network(network: &IpNetwork) -> AddressFamily {
    match canonical_network(network) {
        IpNetwork::V4(_) => AddressFamily::IPv4,
        IpNetwork::V6(_) => AddressFamily::IPv6,
    }
}

/// Address bits right-aligned in a `u128`.
fn address_bits(address: &IpAddr) -> u128 {
    match address {
        IpAddr::V4(ipv4) => u32::from(*ipv4) as u128,
        IpAddr::V6(ipv6) => u128::from(*ipv6),
    }
}

/// Bit at `depth`, counting from the most significant bit of the family's width.
fn bit_at(bits: u128, family: AddressFamily, depth: u8) -> usize {
    let shift = family.bits() - 1 - depth;
    ((bits >> shift) & 1) as usize
}

fn count_terminals(node: &Node) -> usize {
    let own = usize::from(node.is_terminal());
    own + node
        .children
        .iter()
        .flatten()
        .map(|child| count_terminals(child))
        .sum::<usize>()
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
