use async_trait::async_trait;
use rillcore::{
    require, AdvContext, CodeNode, InputValues, Node, NodeBehavior, NodeError, OutputHandles,
    PinSpec, Value,
};
use std::sync::Arc;

fn number(inputs: &InputValues, pin: &str) -> Result<f64, NodeError> {
    let value = require(inputs, pin)?;
    value.as_f64().ok_or_else(|| NodeError::InvalidInputType {
        field: pin.to_string(),
        expected: "number".to_string(),
        actual: value.kind().to_string(),
    })
}

/// Pure join node: fires once per complete fresh pair of inputs
pub struct AddNode;

#[async_trait]
impl NodeBehavior for AddNode {
    async fn run(
        &self,
        inputs: InputValues,
        outputs: OutputHandles,
        _adv: AdvContext,
    ) -> Result<(), NodeError> {
        let sum = number(&inputs, "n1")? + number(&inputs, "n2")?;
        outputs.next("sum", Value::Number(sum));
        Ok(())
    }
}

pub fn add() -> Node {
    Node::Code(
        CodeNode::new("math.add", Arc::new(AddNode))
            .with_inputs(vec![PinSpec::required("n1"), PinSpec::required("n2")])
            .with_outputs(["sum"])
            .completes_on(["sum"]),
    )
}

pub struct SubtractNode;

#[async_trait]
impl NodeBehavior for SubtractNode {
    async fn run(
        &self,
        inputs: InputValues,
        outputs: OutputHandles,
        _adv: AdvContext,
    ) -> Result<(), NodeError> {
        let result = number(&inputs, "n1")? - number(&inputs, "n2")?;
        outputs.next("result", Value::Number(result));
        Ok(())
    }
}

pub fn subtract() -> Node {
    Node::Code(
        CodeNode::new("math.subtract", Arc::new(SubtractNode))
            .with_inputs(vec![PinSpec::required("n1"), PinSpec::required("n2")])
            .with_outputs(["result"])
            .completes_on(["result"]),
    )
}

pub struct MultiplyNode;

#[async_trait]
impl NodeBehavior for MultiplyNode {
    async fn run(
        &self,
        inputs: InputValues,
        outputs: OutputHandles,
        _adv: AdvContext,
    ) -> Result<(), NodeError> {
        let result = number(&inputs, "n1")? * number(&inputs, "n2")?;
        outputs.next("result", Value::Number(result));
        Ok(())
    }
}

pub fn multiply() -> Node {
    Node::Code(
        CodeNode::new("math.multiply", Arc::new(MultiplyNode))
            .with_inputs(vec![PinSpec::required("n1"), PinSpec::required("n2")])
            .with_outputs(["result"])
            .completes_on(["result"]),
    )
}
