use alloy::primitives::{address, Address};
use alloy::sol;

/// Uniswap V3 SwapRouter (same address on mainnet and mainnet forks).
pub const UNISWAP_V3_ROUTER_ADDRESS: Address = address!("E592427A0AEce92De3Edee1F18E0157C05861564");

sol! {
    #[sol(rpc)]
    interface ISentinelAmm {
        event LiquidityOperation(
            string operationType,
            uint256 indexed tokenId,
            int24 tickLower,
            int24 tickUpper,
            uint128 liquidity,
            uint256 amount0,
            uint256 amount1
        );

        event FeesOnlyCollected(
            uint256 indexed tokenId,
            uint256 amount0Fees,
            uint256 amount1Fees,
            bool success
        );

        function token0() external view returns (address);
        function token1() external view returns (address);
        function fee() external view returns (uint24);
        function priceFeed() external view returns (address);
        function rangeWidthMultiplier() external view returns (uint24);
        function setRangeWidthMultiplier(uint24 multiplier) external;
        function collectCurrentFeesOnly() external returns (uint256 amount0Fees, uint256 amount1Fees);
        function currentPosition() external view returns (
            uint256 tokenId,
            uint128 liquidity,
            int24 tickLower,
            int24 tickUpper,
            bool active
        );
    }
}

sol! {
    #[sol(rpc)]
    interface IAutomationTrigger {
        function manualTrigger(int24 predictedTick, uint256 predictedPrice) external;
    }
}

sol! {
    #[sol(rpc)]
    interface IAggregatorV3 {
        function latestRoundData() external view returns (
            uint80 roundId,
            int256 answer,
            uint256 startedAt,
            uint256 updatedAt,
            uint80 answeredInRound
        );
    }
}

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
    }
}

sol! {
    #[sol(rpc)]
    interface ISwapRouter {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 deadline;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams calldata params) external payable returns (uint256 amountOut);
    }
}
