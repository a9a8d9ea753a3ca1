use alloy::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    contract IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    // Solidly-style router fronting the concentrated pools. Route field names
    // are local; only the field types and order reach the wire.
    #[derive(Debug, PartialEq, Eq)]
    contract ISwapRouter {
        struct Route {
            address pair;
            address tokenIn;
            address tokenOut;
            bool stable;
            bool concentrated;
            address receiver;
        }

        function swapExactTokensForTokens(
            uint256 amountIn,
            uint256 amountOutMin,
            Route[] calldata routes,
            address to,
            uint256 deadline
        ) external returns (uint256[] memory amounts);
    }

    #[derive(Debug, PartialEq, Eq)]
    contract INonfungiblePositionManager {
        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);

        struct MintParams {
            address token0;
            address token1;
            address deployer;
            int24 tickLower;
            int24 tickUpper;
            uint256 amount0Desired;
            uint256 amount1Desired;
            uint256 amount0Min;
            uint256 amount1Min;
            address recipient;
            uint256 deadline;
        }

        struct DecreaseLiquidityParams {
            uint256 tokenId;
            uint128 liquidity;
            uint256 amount0Min;
            uint256 amount1Min;
            uint256 deadline;
        }

        struct CollectParams {
            uint256 tokenId;
            address recipient;
            uint128 amount0Max;
            uint128 amount1Max;
        }

        function mint(MintParams calldata params) external payable returns (uint256 tokenId, uint128 liquidity, uint256 amount0, uint256 amount1);
        function positions(uint256 tokenId) external view returns (uint88 nonce, address operator, address token0, address token1, int24 tickLower, int24 tickUpper, uint128 liquidity, uint256 feeGrowthInside0LastX128, uint256 feeGrowthInside1LastX128, uint128 tokensOwed0, uint128 tokensOwed1);
        function decreaseLiquidity(DecreaseLiquidityParams calldata params) external payable returns (uint256 amount0, uint256 amount1);
        function collect(CollectParams calldata params) external payable returns (uint256 amount0, uint256 amount1);
        function burn(uint256 tokenId) external payable;
        function multicall(bytes[] calldata data) external payable returns (bytes[] memory results);
        function ownerOf(uint256 tokenId) external view returns (address);
        function approve(address to, uint256 tokenId) external;
        function getApproved(uint256 tokenId) external view returns (address);
    }

    #[derive(Debug, PartialEq, Eq)]
    contract IGauge {
        function deposit(uint256 tokenId) external;
    }

    #[derive(Debug, PartialEq, Eq)]
    contract IFarmingCenter {
        struct IncentiveKey {
            address rewardToken;
            address bonusRewardToken;
            address pool;
            uint256 nonce;
        }

        function exitFarming(IncentiveKey calldata key, uint256 tokenId) external;
        function collectRewards(IncentiveKey calldata key, uint256 tokenId) external returns (uint256 reward, uint256 bonusReward);
        function deposits(uint256 tokenId) external view returns (bytes32 incentiveId);
        function multicall(bytes[] calldata data) external payable returns (bytes[] memory results);
    }

    #[derive(Debug, PartialEq, Eq)]
    contract IAlgebraPool {
        function safelyGetStateOfAMM() external view returns (uint160 sqrtPrice, int24 tick, uint16 lastFee, uint8 pluginConfig, uint128 activeLiquidity, int24 nextTick, int24 previousTick);
        function tickSpacing() external view returns (int24);
    }
}
