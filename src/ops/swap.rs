use alloy::{
    primitives::{Address, Bytes, B256, U256},
    sol_types::SolCall,
};

use super::{Executor, Execution, TxLog};
use crate::{adapter::ChainClient, errors::PipelineError, interfaces::ISwapRouter};

#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub amount_in: U256,
    pub token_in: Address,
    pub token_out: Address,
    pub min_amount_out: U256,
}

#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub tx_hash: B256,
    pub amount_in: U256,
    pub min_amount_out: U256,
}

impl<C> Executor<C>
where
    C: ChainClient,
{
    /// Swaps `amount_in` through the router with a single concentrated hop,
    /// approving the router first if its allowance is short.
    pub async fn swap(&self, request: SwapRequest) -> Execution<SwapOutcome> {
        let mut log = TxLog::default();
        let outcome = self.swap_inner(&request, &mut log).await;
        log.finish(outcome)
    }

    async fn swap_inner(
        &self,
        request: &SwapRequest,
        log: &mut TxLog,
    ) -> Result<SwapOutcome, PipelineError> {
        if request.amount_in.is_zero() {
            return Err(PipelineError::Argument("swap amount must be positive".into()));
        }
        let pair = [self.book().token0, self.book().token1];
        if !pair.contains(&request.token_in)
            || !pair.contains(&request.token_out)
            || request.token_in == request.token_out
        {
            return Err(PipelineError::Argument(
                "swap must stay within the managed pair".into(),
            ));
        }

        self.ensure_allowance(request.token_in, self.book().router, request.amount_in, log)
            .await?;

        let route = ISwapRouter::Route {
            pair: self.book().pool,
            tokenIn: request.token_in,
            tokenOut: request.token_out,
            stable: true,
            concentrated: true,
            receiver: self.owner(),
        };
        let calldata: Bytes = ISwapRouter::swapExactTokensForTokensCall {
            amountIn: request.amount_in,
            amountOutMin: request.min_amount_out,
            routes: vec![route],
            to: self.owner(),
            deadline: self.deadline(),
        }
        .abi_encode()
        .into();

        let receipt = self.submit(self.book().router, calldata, "Swap", log).await?;
        tracing::info!(
            tx_hash = ?receipt.tx_hash,
            amount_in = %request.amount_in,
            token_in = ?request.token_in,
            "swap confirmed"
        );

        Ok(SwapOutcome {
            tx_hash: receipt.tx_hash,
            amount_in: request.amount_in,
            min_amount_out: request.min_amount_out,
        })
    }
}
