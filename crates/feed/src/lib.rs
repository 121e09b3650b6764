//! 上游行情数据源适配器。每个数据源一个模块，均实现 `MarketDataProvider`。

pub mod zhitu;
