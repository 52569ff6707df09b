//! Bridge token families and chain slugs

/// Chains the bridge deploys to, with their layer-1 flag
pub const BRIDGE_CHAINS: [(&str, bool); 5] = [
    ("ethereum", true),
    ("arbitrum", false),
    ("gnosis", false),
    ("optimism", false),
    ("polygon", false),
];

pub fn is_bridge_chain(slug: &str) -> bool {
    BRIDGE_CHAINS.iter().any(|(s, _)| *s == slug)
}

/// Map wallet asset codes onto the bridge token they travel as.
/// The first code with a known family wins.
pub fn canonical_family<'a, I>(codes: I) -> Option<&'static str>
where
    I: IntoIterator<Item = &'a str>,
{
    codes.into_iter().find_map(|code| match code {
        "DAI" => Some("DAI"),
        "ETH" | "WETH" => Some("ETH"),
        "MATIC" | "WMATIC" => Some("MATIC"),
        "USDC" => Some("USDC"),
        "USDT" => Some("USDT"),
        "WBTC" => Some("WBTC"),
        "XDAI" | "WXDAI" => Some("XDAI"),
        _ => None,
    })
}
