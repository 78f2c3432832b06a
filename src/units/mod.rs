mod wei;

pub use wei::ParseEthAmountError;
pub use wei::WeiNewtype;

pub const ETH_DECIMALS: usize = 18;

pub const WEI_PER_ETH: i128 = 1_000_000_000_000_000_000;
