//! Solidity bindings for the vault system and its auxiliary helpers.
//!
//! Uses alloy's `sol!` macro to generate type-safe ABI encoders/decoders.
//! Only the entry points the harness and the operational scripts drive are
//! declared; the contracts themselves live outside this repository.

use alloy::sol;

sol! {
    /// Registry view every vault component inherits: each one stores the
    /// addresses of all six components after `setComponents`.
    #[sol(rpc)]
    interface IComponents {
        function setComponents(
            address _uniswapMath,
            address _vault,
            address _auction,
            address _vaultMath,
            address _vaultTreasury,
            address _vaultStorage
        ) external;

        function uniswapMath() external view returns (address);
        function vault() external view returns (address);
        function auction() external view returns (address);
        function vaultMath() external view returns (address);
        function vaultTreasury() external view returns (address);
        function vaultStorage() external view returns (address);
    }

    /// Wiring entry point of the local build, which also takes the
    /// governance address.
    #[sol(rpc)]
    interface IComponentsGoverned {
        function setComponents(
            address _uniswapMath,
            address _vault,
            address _auction,
            address _vaultMath,
            address _vaultTreasury,
            address _vaultStorage,
            address _governance
        ) external;
    }

    #[sol(rpc)]
    interface IVault {
        function deposit(
            uint256 amountEth,
            uint256 amountUsdc,
            uint256 amountOsqth,
            address to,
            uint256 amountEthMin,
            uint256 amountUsdcMin,
            uint256 amountOsqthMin
        ) external returns (uint256 shares);

        function withdraw(
            uint256 shares,
            uint256 amountEthMin,
            uint256 amountUsdcMin,
            uint256 amountOsqthMin
        ) external;

        function calcSharesAndAmounts(
            uint256 _amountEth,
            uint256 _amountUsdc,
            uint256 _amountOsqth,
            uint256 _totalSupply
        ) external view returns (uint256 shares, uint256 amountEth, uint256 amountUsdc, uint256 amountOsqth);

        function balanceOf(address account) external view returns (uint256);
        function totalSupply() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IVaultAuction {
        function timeRebalance(
            address keeper,
            uint256 minAmountEth,
            uint256 minAmountUsdc,
            uint256 minAmountOsqth
        ) external;
    }

    #[sol(rpc)]
    interface IVaultMath {
        function getTotalAmounts() external view returns (uint256 ethAmount, uint256 usdcAmount, uint256 osqthAmount);
    }

    #[sol(rpc)]
    interface IVaultTreasury {
        function uniswapV3MintCallback(uint256 amount0Owed, uint256 amount1Owed, bytes calldata data) external;
    }

    #[sol(rpc)]
    interface IVaultStorage {
        function setPause(bool _pause) external;
        function setRebalanceThreshold(uint256 _rebalanceThreshold) external;
        function setParamsBeforeDepositMock(uint256 _timeAtLastRebalance, uint256 _ivAtLastRebalance, uint256 _ethPriceAtLastRebalance) external;
        function governance() external view returns (address);
    }

    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
    }

    /// Uniswap v3 swap helper used by scenarios to move pool prices.
    #[sol(rpc)]
    interface IV3Helper {
        function swapWETH_USDC(uint256 amount) external;
        function swapUSDC_WETH(uint256 amount) external;
        function swapOSQTH_WETH(uint256 amount) external;
        function swapWETH_OSQTH(uint256 amount) external;
    }

    #[sol(rpc)]
    interface IFlashDeposit {
        function setContracts(address _vault) external;
        function deposit(
            uint256 amountEth,
            uint256 slippage,
            address to,
            uint256 amountEthMin,
            uint256 amountUsdcMin,
            uint256 amountOsqthMin
        ) external;
    }

    /// Test rebalancer that signals a profitable rebalance by reverting with `Success`.
    #[sol(rpc)]
    interface IMockRebalancer {
        function rebalance() external;
    }

    #[sol(rpc)]
    interface IBigRebalancer {
        function rebalance(uint256 threshold, uint256 triggerTime) external;
        function collectProtocol(uint256 amountEth, uint256 amountUsdc, uint256 amountOsqth, address to) external;
        function transferOwnership(address newOwner) external;
        function owner() external view returns (address);
        function addressAuction() external view returns (address);
        function addressMath() external view returns (address);
    }

    #[sol(rpc)]
    interface ICheapRebalancer {
        function rebalance(uint256 threshold, uint256 newPriceMultiplier) external;
        function returnGovernance(address to) external;
    }
}
