pub mod eastmoney;
pub mod util;
